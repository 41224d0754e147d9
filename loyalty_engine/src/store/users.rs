use sqlx::PgPool;

use crate::{
    db_types::{BalanceInfo, UserCredentials},
    errors::is_unique_violation,
    StoreError,
};

/// Insert a new user row with zeroed balances. The caller supplies the salted password digest;
/// the store never sees a cleartext password.
pub(crate) async fn insert_user(
    login: &str,
    password_digest: &str,
    salt: &str,
    pool: &PgPool,
) -> Result<i64, StoreError> {
    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (login, password, salt) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(login)
    .bind(password_digest)
    .bind(salt)
    .fetch_one(pool)
    .await;
    match inserted {
        Ok(id) => Ok(id),
        Err(e) if is_unique_violation(&e) => Err(StoreError::UserAlreadyExists),
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn credentials_for_login(login: &str, pool: &PgPool) -> Result<Option<UserCredentials>, StoreError> {
    let row = sqlx::query_as::<_, UserCredentials>("SELECT id, password, salt FROM users WHERE login = $1")
        .bind(login)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// The denormalised single-row read: `balance` and `withdrawn` live in the users table and are
/// maintained by the withdrawal and accrual transactions.
pub(crate) async fn balance_for_user(user_id: i64, pool: &PgPool) -> Result<BalanceInfo, StoreError> {
    let balance =
        sqlx::query_as::<_, BalanceInfo>("SELECT balance AS current, withdrawn FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(balance)
}
