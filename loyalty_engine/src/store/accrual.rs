//! Application of oracle replies to durable state.
//!
//! Every mutation here carries the `AND NOT is_final` guard. That predicate - not any in-memory
//! bookkeeping - is what makes reply delivery idempotent: a duplicated or out-of-order reply for
//! an order that already reached INVALID or PROCESSED matches zero rows and cannot double-credit
//! a balance, across worker races and process restarts alike.

use log::*;
use sqlx::PgPool;

use crate::{
    db_types::{AccrualReply, AccrualStatus, OrderStatus},
    StoreError,
};

pub(crate) async fn apply_accrual_response(reply: &AccrualReply, pool: &PgPool) -> Result<(), StoreError> {
    match reply.status {
        // The oracle has registered the order but not started on it. No transition.
        AccrualStatus::Registered => Ok(()),
        AccrualStatus::Processing => mark_processing(&reply.order, pool).await,
        AccrualStatus::Invalid => finalise_invalid(&reply.order, pool).await,
        AccrualStatus::Processed => credit_processed(reply, pool).await,
        AccrualStatus::Unknown => Err(StoreError::UnknownAccrualStatus(reply.order.clone())),
    }
}

async fn mark_processing(order_num: &str, pool: &PgPool) -> Result<(), StoreError> {
    let updated = sqlx::query("UPDATE orders SET status = $1 WHERE order_num = $2 AND NOT is_final")
        .bind(OrderStatus::Processing.code())
        .bind(order_num)
        .execute(pool)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(StoreError::NoDataChanged);
    }
    Ok(())
}

async fn finalise_invalid(order_num: &str, pool: &PgPool) -> Result<(), StoreError> {
    let updated = sqlx::query("UPDATE orders SET status = $1, is_final = true WHERE order_num = $2 AND NOT is_final")
        .bind(OrderStatus::Invalid.code())
        .bind(order_num)
        .execute(pool)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(StoreError::NoDataChanged);
    }
    debug!("🗃️ Order {order_num} finalised as INVALID");
    Ok(())
}

/// The atomic core: finalise the order and credit its owner in one transaction at the default
/// read-committed level. The guarded first UPDATE matching zero rows means the order is already
/// final (or absent), so the transaction rolls back without touching the balance.
async fn credit_processed(reply: &AccrualReply, pool: &PgPool) -> Result<(), StoreError> {
    let accrual = reply.accrual.unwrap_or_default();
    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        "UPDATE orders SET status = $1, accrual = $2, is_final = true WHERE order_num = $3 AND NOT is_final",
    )
    .bind(OrderStatus::Processed.code())
    .bind(accrual)
    .bind(&reply.order)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(StoreError::NoDataChanged);
    }
    sqlx::query("UPDATE users SET balance = balance + $1 WHERE id = (SELECT user_id FROM orders WHERE order_num = $2)")
        .bind(accrual)
        .bind(&reply.order)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    debug!("🗃️ Order {} finalised as PROCESSED; {accrual} credited", reply.order);
    Ok(())
}
