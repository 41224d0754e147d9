//! The accrual poll worker pool.
//!
//! `N` workers share one bounded FIFO channel of [`OrderTag`]s, one [`CancelWaiter`] and one
//! `last_rescue_scan` stamp. Tags whose `poll_after` lies in the future are parked at the back of
//! the queue; tags older than the latest rescue sweep are dropped. A 429 from the oracle pauses
//! the whole pool through the shared waiter, so the remote's rate window is honoured regardless of
//! how many workers are running.

use std::sync::Arc;

use chrono::{Duration, Utc};
use log::*;
use tokio::{
    sync::{mpsc, mpsc::error::TryRecvError, Mutex},
    task::JoinHandle,
};

use crate::{
    db_types::OrderTag,
    poll::{
        oracle::{AccrualOracle, PollOutcome},
        waiter::{CancelWaiter, SharedTime},
    },
    traits::AccrualSink,
    StoreError,
};

/// Back-off before re-polling an order that is still in flight or briefly unreachable.
const RETRY_SECS: i64 = 5;
/// Nap length when the tag queue is empty or its head has not matured yet.
const IDLE_SLEEP: std::time::Duration = std::time::Duration::from_millis(1);

/// Shared state handed to each worker. Cloning is cheap: every field is a handle.
pub struct PollerContext<S, O> {
    pub sink: S,
    pub oracle: O,
    pub tags_tx: mpsc::Sender<OrderTag>,
    pub tags_rx: Arc<Mutex<mpsc::Receiver<OrderTag>>>,
    pub waiter: Arc<CancelWaiter>,
    pub last_rescue_scan: Arc<SharedTime>,
}

impl<S: Clone, O: Clone> Clone for PollerContext<S, O> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            oracle: self.oracle.clone(),
            tags_tx: self.tags_tx.clone(),
            tags_rx: Arc::clone(&self.tags_rx),
            waiter: Arc::clone(&self.waiter),
            last_rescue_scan: Arc::clone(&self.last_rescue_scan),
        }
    }
}

/// Spawn the pool. The returned handles finish once the shutdown flag behind the shared waiter
/// flips (or the tag channel closes).
pub fn start_poll_workers<S, O>(workers: usize, ctx: PollerContext<S, O>) -> Vec<JoinHandle<()>>
where
    S: AccrualSink + Clone + Send + Sync + 'static,
    O: AccrualOracle + Clone + Send + Sync + 'static,
{
    (1..=workers)
        .map(|id| {
            let ctx = ctx.clone();
            tokio::spawn(worker_loop(id, ctx))
        })
        .collect()
}

async fn worker_loop<S, O>(id: usize, ctx: PollerContext<S, O>)
where
    S: AccrualSink + Send + Sync,
    O: AccrualOracle + Send + Sync,
{
    info!("📡️ Accrual poll worker {id} started");
    loop {
        if ctx.waiter.wait_tick().await.is_err() {
            break;
        }

        let tag = match ctx.tags_rx.lock().await.try_recv() {
            Ok(tag) => tag,
            Err(TryRecvError::Empty) => {
                tokio::time::sleep(IDLE_SLEEP).await;
                continue;
            },
            Err(TryRecvError::Disconnected) => break,
        };

        if tag.poll_after > Utc::now() {
            // Not due yet: the queue is FIFO, so parking the tag at the back is a bounded spin
            // while the head matures.
            requeue(&ctx.tags_tx, tag).await;
            tokio::time::sleep(IDLE_SLEEP).await;
            continue;
        }

        if tag.issued_at < ctx.last_rescue_scan.get() {
            debug!("📡️ Worker {id}: dropping stale tag for order {}", tag.order_num);
            continue;
        }

        debug!("📡️ Worker {id}: polling the oracle for order {}", tag.order_num);
        match ctx.oracle.poll_order(&tag.order_num).await {
            Err(e) => {
                warn!("📡️ Worker {id}: {e}; order {} retries in {RETRY_SECS}s", tag.order_num);
                requeue(&ctx.tags_tx, tag.retry_in(Duration::seconds(RETRY_SECS))).await;
            },
            Ok(PollOutcome::Reply(reply)) => {
                debug!("📡️ Worker {id}: order {} reported as {}", reply.order, reply.status);
                match ctx.sink.apply_accrual_response(&reply).await {
                    Ok(()) => {},
                    Err(StoreError::NoDataChanged) => {
                        debug!("📡️ Worker {id}: reply for order {} changed nothing", reply.order)
                    },
                    Err(e) => error!("📡️ Worker {id}: could not apply reply for order {}: {e}", reply.order),
                }
                if !reply.status.is_terminal() {
                    requeue(&ctx.tags_tx, tag.retry_in(Duration::seconds(RETRY_SECS))).await;
                }
            },
            Ok(PollOutcome::RateLimited { retry_after }) => {
                // The tag goes back untouched - the oracle's schedule wins over our back-off -
                // and the shared waiter pauses every worker in the pool.
                info!("📡️ Worker {id}: oracle rate limit hit; pool pauses for {retry_after}s");
                requeue(&ctx.tags_tx, tag).await;
                ctx.waiter.delay_until(Utc::now() + Duration::seconds(retry_after as i64));
            },
            Ok(PollOutcome::Rejected(code)) => {
                warn!("📡️ Worker {id}: oracle rejected order {} with status {code}; tag dropped", tag.order_num);
            },
        }
    }
    info!("📡️ Accrual poll worker {id} stopped");
}

async fn requeue(tx: &mpsc::Sender<OrderTag>, tag: OrderTag) {
    if let Err(e) = tx.send(tag).await {
        error!("📡️ Tag channel closed; dropping order {}", e.0.order_num);
    }
}
