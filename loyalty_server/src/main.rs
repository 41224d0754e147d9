use dotenvy::dotenv;
use log::*;
use loyalty_server::{config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_or_default();
    if !preflight_check(&config) {
        eprintln!("🚦️ Preflight check failed. Exiting. Check the logs for details.");
        return;
    }
    match run_server(config).await {
        Ok(()) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

fn preflight_check(config: &ServerConfig) -> bool {
    info!("🚦️ Running preflight checks...");
    let mut result = true;
    if config.connection_string.is_empty() {
        error!("🚦️ DATABASE_URI is not set. Point it at the gateway's PostgreSQL database.");
        result = false;
    }
    if config.accrual_base.is_empty() {
        error!("🚦️ ACCRUAL_SYSTEM_ADDRESS is empty. The poll workers have no oracle to talk to.");
        result = false;
    }
    if result {
        info!("🚦️ Preflight check PASSED.");
    } else {
        error!("🚦️ Preflight check FAILED: fix the issues above before starting the server.");
    }
    result
}
