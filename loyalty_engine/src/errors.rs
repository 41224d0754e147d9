use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("this login already exists in the database")]
    UserAlreadyExists,
    #[error("authentication failed")]
    UserAuthFailed,
    #[error("this order already exists in the database")]
    OrderAlreadyExists,
    #[error("this order belongs to another user")]
    OrderOtherUser,
    #[error("order number failed the Luhn check")]
    OrderLuhnCheckFailed,
    #[error("not enough bonus points")]
    WithdrawNotEnough,
    /// Benign outcome of an accrual reply that matched no mutable row: the order is already
    /// final, or it is not in the store at all.
    #[error("accrual reply changed no data")]
    NoDataChanged,
    #[error("unknown accrual status in the reply for order {0}")]
    UnknownAccrualStatus(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn db_error_kind(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::Database(db) => db.kind(),
        _ => ErrorKind::Other,
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(db_error_kind(err), ErrorKind::UniqueViolation)
}

pub(crate) fn is_check_violation(err: &sqlx::Error) -> bool {
    matches!(db_error_kind(err), ErrorKind::CheckViolation)
}
