use lpg_common::Money;
use serde::Deserialize;

/// Body of the register and login calls.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Body of `POST /api/user/balance/withdraw`. `order` is a free-form reference to an order
/// number, not necessarily one submitted to this service.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Money,
}
