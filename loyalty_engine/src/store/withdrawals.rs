use log::*;
use lpg_common::Money;
use sqlx::PgPool;

use crate::{db_types::WithdrawalInfo, errors::is_check_violation, StoreError};

/// Debit `sum` points from the user in one transaction: append the withdrawals row, then move the
/// balance. The `chk_balance_not_negative` constraint fails the debit on insufficient funds, which
/// rolls the insert back with it - either both effects commit or neither does.
pub(crate) async fn withdraw(user_id: i64, order_num: &str, sum: Money, pool: &PgPool) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT INTO withdrawals (user_id, order_num, sum) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(order_num)
        .bind(sum)
        .execute(&mut *tx)
        .await?;
    let debited = sqlx::query("UPDATE users SET balance = balance - $1, withdrawn = withdrawn + $1 WHERE id = $2")
        .bind(sum)
        .bind(user_id)
        .execute(&mut *tx)
        .await;
    match debited {
        Ok(_) => {
            tx.commit().await?;
            debug!("🗃️ User #{user_id} withdrew {sum} against order {order_num}");
            Ok(())
        },
        Err(e) if is_check_violation(&e) => Err(StoreError::WithdrawNotEnough),
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn withdrawals_for_user(user_id: i64, pool: &PgPool) -> Result<Vec<WithdrawalInfo>, StoreError> {
    let withdrawals = sqlx::query_as::<_, WithdrawalInfo>(
        "SELECT order_num, sum, processed_at FROM withdrawals WHERE user_id = $1 ORDER BY processed_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(withdrawals)
}
