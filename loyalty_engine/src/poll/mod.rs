//! The accrual polling subsystem: the shared waiter, the oracle client, the worker pool and the
//! rescue scanner.

pub mod oracle;
pub mod rescue;
pub mod waiter;
pub mod worker;

pub use oracle::{AccrualOracle, HttpOracle, OracleError, PollOutcome};
pub use rescue::start_rescue_scanner;
pub use waiter::{CancelWaiter, Cancelled, SharedTime};
pub use worker::{start_poll_workers, PollerContext};
