use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use loyalty_engine::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("user is not logged in")]
    NotLoggedIn,
    #[error("could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("order number must be a non-empty digit string")]
    MalformedOrderNumber,
    #[error("withdrawal sum must be positive")]
    NonPositiveSum,
    #[error("an I/O error happened in the server: {0}")]
    IOError(#[from] std::io::Error),
    #[error("unspecified error: {0}")]
    Unspecified(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotLoggedIn => StatusCode::UNAUTHORIZED,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::MalformedOrderNumber => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NonPositiveSum => StatusCode::BAD_REQUEST,
            Self::IOError(_) | Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(e) => store_status(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).insert_header(ContentType::plaintext()).body(self.to_string())
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::UserAlreadyExists | StoreError::OrderOtherUser => StatusCode::CONFLICT,
        StoreError::UserAuthFailed => StatusCode::UNAUTHORIZED,
        // Re-submitting one's own order is benign; the route normally answers before this is hit.
        StoreError::OrderAlreadyExists => StatusCode::OK,
        StoreError::OrderLuhnCheckFailed => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::WithdrawNotEnough => StatusCode::PAYMENT_REQUIRED,
        StoreError::NoDataChanged
        | StoreError::UnknownAccrualStatus(_)
        | StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
