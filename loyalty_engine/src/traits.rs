//! Seams between the engine's moving parts.
//!
//! The poll workers and the rescue scanner only ever talk to durable state through these two
//! traits. [`crate::PointsStore`] implements both; tests substitute in-memory doubles.

use async_trait::async_trait;

use crate::{db_types::AccrualReply, errors::StoreError};

#[async_trait]
pub trait AccrualSink {
    /// Apply one oracle reply to durable state.
    ///
    /// Must be idempotent for terminal orders: a duplicated or late reply about an order that is
    /// already final comes back as [`StoreError::NoDataChanged`] and leaves the row untouched.
    async fn apply_accrual_response(&self, reply: &AccrualReply) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RescueSource {
    /// Order numbers of every order not yet in a terminal state.
    async fn unhandled_orders(&self) -> Result<Vec<String>, StoreError>;
}
