//! Request handler definitions.
//!
//! Handlers stay thin: decode, delegate to the store, map the result to a status code. Anything
//! with real logic belongs in the engine.

use actix_web::{get, post, web, HttpResponse, Responder};
use log::*;
use loyalty_engine::{PointsStore, StoreError};

use crate::{
    auth::{generate_salt, hash_password, hex_decode, hex_string, session_cookie, AuthenticatedUser, SessionMap},
    data_objects::{Credentials, WithdrawRequest},
    errors::ServerError,
};

// ----------------------------------------   Health  ----------------------------------------------

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------    Auth   ----------------------------------------------

#[post("/api/user/register")]
pub async fn register(
    store: web::Data<PointsStore>,
    sessions: web::Data<SessionMap>,
    body: web::Json<Credentials>,
) -> Result<HttpResponse, ServerError> {
    let salt = generate_salt();
    let digest = hash_password(&body.password, &salt);
    let user_id = store.register_user(&body.login, &digest, &hex_string(&salt)).await?;
    info!("💻️ New user {} registered", body.login);
    let token = sessions.issue(user_id, &body.login);
    Ok(HttpResponse::Ok().cookie(session_cookie(token, sessions.idle_time())).finish())
}

#[post("/api/user/login")]
pub async fn login(
    store: web::Data<PointsStore>,
    sessions: web::Data<SessionMap>,
    body: web::Json<Credentials>,
) -> Result<HttpResponse, ServerError> {
    let credentials = store.user_credentials(&body.login).await?.ok_or(StoreError::UserAuthFailed)?;
    let salt = hex_decode(&credentials.salt)
        .ok_or_else(|| ServerError::Unspecified(format!("stored salt for {} is not valid hex", body.login)))?;
    if hash_password(&body.password, &salt) != credentials.password {
        return Err(StoreError::UserAuthFailed.into());
    }
    debug!("💻️ User {} logged in", body.login);
    let token = sessions.issue(credentials.id, &body.login);
    Ok(HttpResponse::Ok().cookie(session_cookie(token, sessions.idle_time())).finish())
}

// ----------------------------------------   Orders  ----------------------------------------------

#[post("/api/user/orders")]
pub async fn submit_order(
    user: AuthenticatedUser,
    store: web::Data<PointsStore>,
    body: String,
) -> Result<HttpResponse, ServerError> {
    let order_num = body.trim();
    if !is_digit_string(order_num) {
        return Err(ServerError::InvalidRequestBody("the body must be a bare order number".into()));
    }
    match store.add_order(user.user_id, order_num).await {
        Ok(()) => Ok(HttpResponse::Accepted().finish()),
        // Re-submitting one's own order is not an error.
        Err(StoreError::OrderAlreadyExists) => Ok(HttpResponse::Ok().finish()),
        Err(e) => Err(e.into()),
    }
}

#[get("/api/user/orders")]
pub async fn list_orders(
    user: AuthenticatedUser,
    store: web::Data<PointsStore>,
) -> Result<HttpResponse, ServerError> {
    let orders = store.orders_for_user(user.user_id).await?;
    if orders.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(orders))
}

// ----------------------------------------  Balance  ----------------------------------------------

#[get("/api/user/balance")]
pub async fn balance(
    user: AuthenticatedUser,
    store: web::Data<PointsStore>,
) -> Result<HttpResponse, ServerError> {
    let balance = store.balance(user.user_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

#[post("/api/user/balance/withdraw")]
pub async fn withdraw(
    user: AuthenticatedUser,
    store: web::Data<PointsStore>,
    body: web::Json<WithdrawRequest>,
) -> Result<HttpResponse, ServerError> {
    if !is_digit_string(&body.order) {
        return Err(ServerError::MalformedOrderNumber);
    }
    if !body.sum.is_positive() {
        return Err(ServerError::NonPositiveSum);
    }
    store.withdraw(user.user_id, &body.order, body.sum).await?;
    Ok(HttpResponse::Ok().finish())
}

#[get("/api/user/withdrawals")]
pub async fn list_withdrawals(
    user: AuthenticatedUser,
    store: web::Data<PointsStore>,
) -> Result<HttpResponse, ServerError> {
    let withdrawals = store.withdrawals_for_user(user.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(withdrawals))
}

fn is_digit_string(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
