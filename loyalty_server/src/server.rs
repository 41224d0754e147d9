//! Process wiring: the store, the poll worker pool, the rescue scanner, the reconnection probe
//! and the actix server, assembled around one shutdown channel.
//!
//! Shutdown order matters: the HTTP server stops accepting first, then the watch flag flips and
//! every background task exits at its next waiter tick, then the task handles are joined and the
//! pool is closed.

use std::sync::Arc;

use actix_web::{
    dev::Server,
    middleware::{Compress, Logger},
    web,
    App,
    HttpServer,
};
use chrono::Duration;
use log::*;
use loyalty_engine::{
    poll::{start_poll_workers, start_rescue_scanner, CancelWaiter, HttpOracle, PollerContext, SharedTime},
    PointsStore,
    StoreConfig,
};
use tokio::sync::{mpsc, watch, Mutex};

use crate::{auth::SessionMap, config::ServerConfig, errors::ServerError, routes};

const RESCUE_PERIOD_SECS: i64 = 60;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let (tags_tx, tags_rx) = mpsc::channel(config.poll_queue);
    let store_config = StoreConfig {
        connection_string: config.connection_string.clone(),
        use_luhn: config.use_luhn,
        ..StoreConfig::default()
    };
    let store = PointsStore::connect(&store_config, tags_tx.clone()).await?;
    store.create_schema().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let last_rescue_scan = Arc::new(SharedTime::now());
    let ctx = PollerContext {
        sink: store.clone(),
        oracle: HttpOracle::new(config.accrual_base.clone()),
        tags_tx: tags_tx.clone(),
        tags_rx: Arc::new(Mutex::new(tags_rx)),
        waiter: Arc::new(CancelWaiter::new(shutdown_rx.clone(), Duration::zero())),
        last_rescue_scan: Arc::clone(&last_rescue_scan),
    };
    let mut tasks = start_poll_workers(config.poll_workers, ctx);
    tasks.push(start_rescue_scanner(
        store.clone(),
        tags_tx,
        shutdown_rx.clone(),
        last_rescue_scan,
        Duration::seconds(RESCUE_PERIOD_SECS),
    ));
    tasks.push(store.start_auto_heal(shutdown_rx));

    let srv = create_server_instance(&config, store.clone(), SessionMap::new())?;
    let result = srv.await;

    info!("🚀️ HTTP server stopped; shutting down background tasks");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    store.close().await;
    info!("🚀️ Shutdown complete");
    result.map_err(ServerError::from)
}

pub fn create_server_instance(
    config: &ServerConfig,
    store: PointsStore,
    sessions: SessionMap,
) -> Result<Server, ServerError> {
    let (host, port) = config.listen_addr();
    info!("🚀️ Starting server on {host}:{port}");
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %U"))
            .wrap(Compress::default())
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(sessions.clone()))
            .service(routes::health)
            .service(routes::register)
            .service(routes::login)
            .service(routes::submit_order)
            .service(routes::list_orders)
            .service(routes::balance)
            .service(routes::withdraw)
            .service(routes::list_withdrawals)
    })
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
