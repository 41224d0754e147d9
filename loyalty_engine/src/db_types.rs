use chrono::{DateTime, Utc};
use lpg_common::Money;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;

//--------------------------------------    OrderStatus     ----------------------------------------------------------

/// Lifecycle of a submitted order.
///
/// `Invalid` and `Processed` are terminal: once an order reaches one of them the `is_final` column
/// flips and no later accrual reply may change the row again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
    /// A status code this build does not know about.
    Unknown,
}

impl OrderStatus {
    pub fn code(self) -> i16 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Invalid => 2,
            OrderStatus::Processed => 3,
            OrderStatus::Unknown => -1,
        }
    }

    pub fn from_code(code: i16) -> Self {
        match code {
            0 => OrderStatus::New,
            1 => OrderStatus::Processing,
            2 => OrderStatus::Invalid,
            3 => OrderStatus::Processed,
            _ => OrderStatus::Unknown,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Unknown => "UNKNOWN!!!",
        }
    }
}

impl TryFrom<i16> for OrderStatus {
    type Error = std::convert::Infallible;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        Ok(Self::from_code(code))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

//--------------------------------------   AccrualStatus    ----------------------------------------------------------

/// Status field of an accrual oracle reply.
///
/// `Registered` means the oracle has seen the order but not started on it; it causes no state
/// transition. Anything the oracle invents beyond the four documented names lands on `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
    #[serde(other)]
    Unknown,
}

impl AccrualStatus {
    /// Terminal replies finalise the order; non-terminal ones keep it in the polling loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, AccrualStatus::Processed | AccrualStatus::Invalid)
    }
}

impl std::fmt::Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AccrualStatus::Registered => "REGISTERED",
            AccrualStatus::Processing => "PROCESSING",
            AccrualStatus::Invalid => "INVALID",
            AccrualStatus::Processed => "PROCESSED",
            AccrualStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{name}")
    }
}

//--------------------------------------    AccrualReply    ----------------------------------------------------------

/// Body of a `200 OK` reply from `GET {accrual_base}/api/orders/{order_num}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualReply {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Money>,
}

//--------------------------------------      OrderTag      ----------------------------------------------------------

/// In-memory work item circulating in the tag channel.
///
/// `poll_after` is the earliest wall-clock instant a worker may hit the oracle for this order.
/// `issued_at` records when the tag originated; tags older than the latest rescue sweep are
/// discarded, since the sweep has already re-emitted fresher ones for every live order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTag {
    pub order_num: String,
    pub poll_after: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

impl OrderTag {
    pub fn new(order_num: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { order_num: order_num.into(), poll_after: now, issued_at: now }
    }

    /// A copy scheduled `delay` from now, keeping the original `issued_at`.
    pub fn retry_in(&self, delay: chrono::Duration) -> Self {
        Self { order_num: self.order_num.clone(), poll_after: Utc::now() + delay, issued_at: self.issued_at }
    }
}

//--------------------------------------    Stored views    ----------------------------------------------------------

/// One order row as served to the owner (`GET /api/user/orders`).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderInfo {
    pub number: String,
    #[sqlx(try_from = "i16")]
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Money>,
    pub uploaded_at: DateTime<Utc>,
}

/// Spendable and lifetime-debited points for one user, as a single-row read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BalanceInfo {
    pub current: Money,
    pub withdrawn: Money,
}

/// One withdrawal row (`GET /api/user/withdrawals`). The order number is a free-form reference
/// and deliberately carries no foreign key into `orders`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WithdrawalInfo {
    #[serde(rename = "order")]
    pub order_num: String,
    pub sum: Money,
    pub processed_at: DateTime<Utc>,
}

/// Verifier material for a login attempt.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub password: String,
    pub salt: String,
}
