//! Loyalty Points Engine
//!
//! The engine is the core of the loyalty points gateway. It owns three things:
//!
//! 1. The persistent store: users, orders and withdrawals in PostgreSQL, plus the transaction
//!    discipline that turns asynchronous accrual replies into atomic balance mutations. You should
//!    never need to touch the database directly; go through [`PointsStore`].
//! 2. The accrual poll worker pool: a bounded set of workers that drain an in-memory queue of
//!    order tags, poll the external accrual oracle over HTTP and route replies back into the
//!    store. Rate limiting from the oracle is honoured pool-wide through a shared deadline waiter.
//! 3. The rescue scanner: a periodic sweep that re-injects any non-terminal order found in the
//!    store into the work queue, so that tags lost to backpressure or process restarts are never
//!    lost for good.
//!
//! The store and the pool communicate over a bounded `tokio::sync::mpsc` channel of
//! [`db_types::OrderTag`]s: the sender half is injected into the store at construction, the
//! receiver half into the pool.

pub mod db_types;
pub mod errors;
pub mod helpers;
pub mod poll;
pub mod store;
pub mod traits;

pub use errors::StoreError;
pub use store::{PointsStore, StoreConfig};
