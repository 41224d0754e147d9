use log::*;
use sqlx::PgPool;

use crate::{
    db_types::{OrderInfo, OrderStatus},
    errors::is_unique_violation,
    StoreError,
};

/// Insert a freshly submitted order in state NEW.
///
/// `order_num` is globally unique. On a duplicate, the existing owner decides the outcome:
/// the submitter gets the benign [`StoreError::OrderAlreadyExists`], anyone else
/// [`StoreError::OrderOtherUser`].
pub(crate) async fn insert_order(user_id: i64, order_num: &str, pool: &PgPool) -> Result<(), StoreError> {
    let inserted = sqlx::query("INSERT INTO orders (user_id, order_num) VALUES ($1, $2)")
        .bind(user_id)
        .bind(order_num)
        .execute(pool)
        .await;
    match inserted {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => match owner_of_order(order_num, pool).await? {
            Some(owner) if owner != user_id => {
                error!("🗃️ Order {order_num} belongs to another user");
                Err(StoreError::OrderOtherUser)
            },
            _ => {
                debug!("🗃️ Order {order_num} already exists in the database");
                Err(StoreError::OrderAlreadyExists)
            },
        },
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn owner_of_order(order_num: &str, pool: &PgPool) -> Result<Option<i64>, StoreError> {
    let owner = sqlx::query_scalar::<_, i64>("SELECT user_id FROM orders WHERE order_num = $1")
        .bind(order_num)
        .fetch_optional(pool)
        .await?;
    Ok(owner)
}

pub(crate) async fn orders_for_user(user_id: i64, pool: &PgPool) -> Result<Vec<OrderInfo>, StoreError> {
    let orders = sqlx::query_as::<_, OrderInfo>(
        r#"
        SELECT order_num AS number, status, accrual, uploaded_at
        FROM orders
        WHERE user_id = $1
        ORDER BY uploaded_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

/// Every order not yet in a terminal state, for the rescue scanner.
pub(crate) async fn unhandled_orders(pool: &PgPool) -> Result<Vec<String>, StoreError> {
    let orders = sqlx::query_scalar::<_, String>("SELECT order_num FROM orders WHERE status NOT IN ($1, $2)")
        .bind(OrderStatus::Invalid.code())
        .bind(OrderStatus::Processed.code())
        .fetch_all(pool)
        .await?;
    Ok(orders)
}
