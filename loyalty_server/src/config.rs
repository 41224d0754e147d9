use std::env;

use log::*;
use lpg_common::helpers::env_flag;

const DEFAULT_ENDPOINT: &str = ":8080";
const DEFAULT_ACCRUAL_BASE: &str = "http://localhost:8090";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_POLL_WORKERS: usize = 5;
const DEFAULT_POLL_QUEUE: usize = 500;
/// The workers' park-and-requeue pattern needs headroom in the tag channel; below this the queue
/// can wedge with every slot holding an immature tag.
const MIN_POLL_QUEUE: usize = 10;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL DSN (`DATABASE_URI`).
    pub connection_string: String,
    /// Listen address (`RUN_ADDRESS`), `host:port` or `:port`.
    pub endpoint: String,
    /// Base URL of the accrual oracle (`ACCRUAL_SYSTEM_ADDRESS`).
    pub accrual_base: String,
    /// Gate new order numbers behind the Luhn checksum (`USE_LUHN`).
    pub use_luhn: bool,
    /// Size of the accrual poll worker pool (`LPG_POLL_WORKERS`).
    pub poll_workers: usize,
    /// Capacity of the order tag channel (`LPG_POLL_QUEUE`).
    pub poll_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            connection_string: String::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            accrual_base: DEFAULT_ACCRUAL_BASE.to_string(),
            use_luhn: true,
            poll_workers: DEFAULT_POLL_WORKERS,
            poll_queue: DEFAULT_POLL_QUEUE,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let connection_string = env::var("DATABASE_URI").unwrap_or_else(|_| {
            error!("DATABASE_URI is not set. The gateway cannot reach its database without it.");
            String::default()
        });
        let endpoint = env::var("RUN_ADDRESS").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let accrual_base = env::var("ACCRUAL_SYSTEM_ADDRESS")
            .map(|s| normalize_base_url(&s))
            .unwrap_or_else(|_| DEFAULT_ACCRUAL_BASE.to_string());
        let use_luhn = env_flag("USE_LUHN", true);
        let poll_workers = parse_env("LPG_POLL_WORKERS", DEFAULT_POLL_WORKERS).max(1);
        let poll_queue = parse_env("LPG_POLL_QUEUE", DEFAULT_POLL_QUEUE).max(MIN_POLL_QUEUE);
        Self { connection_string, endpoint, accrual_base, use_luhn, poll_workers, poll_queue }
    }

    /// Split the endpoint into something `HttpServer::bind` accepts. `:8080` binds all
    /// interfaces; anything unusable falls back to the default with a complaint in the log.
    pub fn listen_addr(&self) -> (String, u16) {
        let Some((host, port)) = self.endpoint.rsplit_once(':') else {
            error!("{} is not a valid listen address. Using {DEFAULT_ENDPOINT} instead.", self.endpoint);
            return (DEFAULT_HOST.to_string(), DEFAULT_PORT);
        };
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        let port = port.parse::<u16>().unwrap_or_else(|e| {
            error!("{port} is not a valid port for RUN_ADDRESS. {e} Using {DEFAULT_PORT} instead.");
            DEFAULT_PORT
        });
        (host.to_string(), port)
    }
}

fn parse_env(name: &str, default: usize) -> usize {
    match env::var(name) {
        Err(_) => default,
        Ok(s) => s.parse::<usize>().unwrap_or_else(|e| {
            error!("{s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

/// The original deployment configured the oracle as a bare `host:port`; the HTTP client wants a
/// scheme in front.
pub(crate) fn normalize_base_url(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn listen_addr_handles_bare_port_form() {
        let config = ServerConfig { endpoint: ":8080".into(), ..ServerConfig::default() };
        assert_eq!(config.listen_addr(), ("0.0.0.0".to_string(), 8080));
    }

    #[test]
    fn listen_addr_handles_host_and_port() {
        let config = ServerConfig { endpoint: "127.0.0.1:9999".into(), ..ServerConfig::default() };
        assert_eq!(config.listen_addr(), ("127.0.0.1".to_string(), 9999));
    }

    #[test]
    fn listen_addr_falls_back_on_nonsense() {
        for endpoint in ["nonsense", "host:notaport", ""] {
            let config = ServerConfig { endpoint: endpoint.into(), ..ServerConfig::default() };
            let (_, port) = config.listen_addr();
            assert_eq!(port, 8080, "{endpoint:?} should fall back to the default port");
        }
    }

    #[test]
    fn base_url_gets_a_scheme_when_missing() {
        assert_eq!(normalize_base_url("localhost:8090"), "http://localhost:8090");
        assert_eq!(normalize_base_url("http://accrual:8090/"), "http://accrual:8090");
        assert_eq!(normalize_base_url("https://accrual.example.com"), "https://accrual.example.com");
    }

    #[test]
    fn numeric_overrides_fall_back_on_garbage() {
        env::set_var("LPG_TEST_POLL_WORKERS", "seven");
        assert_eq!(parse_env("LPG_TEST_POLL_WORKERS", 5), 5);
        env::set_var("LPG_TEST_POLL_WORKERS_OK", "7");
        assert_eq!(parse_env("LPG_TEST_POLL_WORKERS_OK", 5), 7);
        assert_eq!(parse_env("LPG_TEST_POLL_WORKERS_MISSING", 5), 5);
    }
}
