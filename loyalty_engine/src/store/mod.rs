//! The transactional persistent store.
//!
//! [`PointsStore`] owns the PostgreSQL connection pool and the sender half of the order tag
//! channel, and is the only way the rest of the system touches durable state. Handles are cheap
//! to clone; every HTTP request, poll worker and background task carries its own clone.

mod accrual;
mod orders;
mod schema;
mod users;
mod withdrawals;

use std::fmt::Debug;

use async_trait::async_trait;
use log::*;
use lpg_common::Money;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::{
    sync::{mpsc, mpsc::error::TrySendError, watch},
    task::JoinHandle,
};

use crate::{
    db_types::{AccrualReply, BalanceInfo, OrderInfo, OrderTag, UserCredentials, WithdrawalInfo},
    helpers::luhn_valid,
    poll::CancelWaiter,
    traits::{AccrualSink, RescueSource},
    StoreError,
};

/// Seconds between connectivity probes of the reconnection task.
const HEAL_PROBE_SECS: i64 = 15;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL DSN.
    pub connection_string: String,
    /// Gate new order numbers behind the Luhn checksum.
    pub use_luhn: bool,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { connection_string: String::default(), use_luhn: true, max_connections: 25 }
    }
}

#[derive(Clone)]
pub struct PointsStore {
    pool: PgPool,
    use_luhn: bool,
    tags: mpsc::Sender<OrderTag>,
}

impl Debug for PointsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PointsStore ({:?})", self.pool)
    }
}

impl PointsStore {
    /// Create the connection pool. The tag sender is injected here so that `add_order` can offer
    /// work to the poll pool without the store ever knowing about the pool itself.
    pub async fn connect(config: &StoreConfig, tags: mpsc::Sender<OrderTag>) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await?;
        Ok(Self { pool, use_luhn: config.use_luhn, tags })
    }

    /// Idempotent: every statement is `CREATE TABLE IF NOT EXISTS`, so the reconnection probe can
    /// replay this after an outage without checking what survived.
    pub async fn create_schema(&self) -> Result<(), StoreError> {
        for statement in schema::ALL_TABLES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Background task that pings the database and replays schema creation once connectivity
    /// returns after a fault.
    pub fn start_auto_heal(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let waiter = CancelWaiter::new(shutdown, chrono::Duration::seconds(HEAL_PROBE_SECS));
            info!("🩺️ Database reconnection probe started");
            let mut was_connected = true;
            loop {
                if waiter.wait_tick().await.is_err() {
                    break;
                }
                let connected = sqlx::query("SELECT 1").execute(store.pool()).await.is_ok();
                if connected && !was_connected {
                    match store.create_schema().await {
                        Ok(()) => warn!("🩺️ Database restored after fault"),
                        Err(e) => error!("🩺️ Re-initialisation after reconnect failed: {e}"),
                    }
                }
                was_connected = connected;
            }
            info!("🩺️ Database reconnection probe stopped");
        })
    }

    //----------------------------------------   Users   ----------------------------------------

    pub async fn register_user(&self, login: &str, password_digest: &str, salt: &str) -> Result<i64, StoreError> {
        users::insert_user(login, password_digest, salt, &self.pool).await
    }

    pub async fn user_credentials(&self, login: &str) -> Result<Option<UserCredentials>, StoreError> {
        users::credentials_for_login(login, &self.pool).await
    }

    pub async fn balance(&self, user_id: i64) -> Result<BalanceInfo, StoreError> {
        users::balance_for_user(user_id, &self.pool).await
    }

    //----------------------------------------   Orders  ----------------------------------------

    /// Insert a new order and offer a tag to the poll pool.
    ///
    /// The offer is non-blocking: when the channel is full the tag is dropped and the order still
    /// counts as accepted, because the rescue scanner will re-emit it on its next sweep.
    pub async fn add_order(&self, user_id: i64, order_num: &str) -> Result<(), StoreError> {
        if self.use_luhn && !luhn_valid(order_num) {
            return Err(StoreError::OrderLuhnCheckFailed);
        }
        orders::insert_order(user_id, order_num, &self.pool).await?;
        match self.tags.try_send(OrderTag::new(order_num)) {
            Ok(()) => {},
            Err(TrySendError::Full(tag)) => {
                warn!("🗃️ Tag channel is full; order {} is left for the rescue scanner", tag.order_num)
            },
            Err(TrySendError::Closed(tag)) => {
                error!("🗃️ Tag channel is closed; order {} is left for the rescue scanner", tag.order_num)
            },
        }
        Ok(())
    }

    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<OrderInfo>, StoreError> {
        orders::orders_for_user(user_id, &self.pool).await
    }

    //----------------------------------------  Balance  ----------------------------------------

    pub async fn withdraw(&self, user_id: i64, order_num: &str, sum: Money) -> Result<(), StoreError> {
        withdrawals::withdraw(user_id, order_num, sum, &self.pool).await
    }

    pub async fn withdrawals_for_user(&self, user_id: i64) -> Result<Vec<WithdrawalInfo>, StoreError> {
        withdrawals::withdrawals_for_user(user_id, &self.pool).await
    }
}

#[async_trait]
impl AccrualSink for PointsStore {
    async fn apply_accrual_response(&self, reply: &AccrualReply) -> Result<(), StoreError> {
        accrual::apply_accrual_response(reply, &self.pool).await
    }
}

#[async_trait]
impl RescueSource for PointsStore {
    async fn unhandled_orders(&self) -> Result<Vec<String>, StoreError> {
        orders::unhandled_orders(&self.pool).await
    }
}
