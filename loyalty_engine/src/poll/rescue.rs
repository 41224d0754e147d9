//! The rescue scanner.
//!
//! Tags are best-effort in two ways: `add_order` drops its tag when the channel is full, and every
//! in-memory tag is lost on restart. The scanner is the safety net: once a minute it asks the
//! store for every non-terminal order and block-pushes a fresh tag for each. Back-pressure is
//! deliberate - when the workers cannot keep up, the scanner waits.

use std::sync::Arc;

use chrono::Utc;
use log::*;
use tokio::{sync::mpsc, sync::watch, task::JoinHandle};

use crate::{
    db_types::OrderTag,
    poll::waiter::{CancelWaiter, SharedTime},
    traits::RescueSource,
};

pub fn start_rescue_scanner<R>(
    source: R,
    tags_tx: mpsc::Sender<OrderTag>,
    shutdown: watch::Receiver<bool>,
    last_rescue_scan: Arc<SharedTime>,
    period: chrono::Duration,
) -> JoinHandle<()>
where
    R: RescueSource + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let waiter = CancelWaiter::new(shutdown, period);
        info!("🛟️ Rescue scanner started");
        loop {
            if waiter.wait_tick().await.is_err() {
                break;
            }

            let orders = match source.unhandled_orders().await {
                Ok(orders) => orders,
                Err(e) => {
                    error!("🛟️ Rescue scan skipped: {e}");
                    continue;
                },
            };

            // Stamp the sweep before pushing: the fresh tags pass the staleness gate, while any
            // older tag for the same orders becomes droppable.
            last_rescue_scan.set(Utc::now());

            if orders.is_empty() {
                continue;
            }
            warn!("🛟️ Found {} unhandled orders", orders.len());
            for order_num in orders {
                if tags_tx.send(OrderTag::new(order_num)).await.is_err() {
                    error!("🛟️ Tag channel closed; rescue scanner exiting");
                    return;
                }
            }
        }
        info!("🛟️ Rescue scanner stopped");
    })
}
