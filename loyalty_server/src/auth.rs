//! Cookie-based session handling and password verification.
//!
//! Sessions are opaque random tokens held server-side in an in-memory map with a sliding idle
//! expiry; restarting the process logs everyone out, which is acceptable for this service.
//! Passwords are stored as hex digests of `salt || password` with a per-user random salt.

use std::{
    collections::HashMap,
    future::{ready, Ready},
    sync::{Arc, RwLock},
};

use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie},
    dev::Payload,
    web,
    FromRequest,
    HttpRequest,
};
use blake2::{Blake2b512, Digest};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use crate::errors::ServerError;

pub(crate) const SESSION_COOKIE: &str = "session_token";
/// A session dies after this long without a request.
const SESSION_IDLE_MINUTES: i64 = 5;

//--------------------------------------     Passwords      ----------------------------------------------------------

pub fn generate_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

pub fn hash_password(password: &str, salt: &[u8]) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex_string(&hasher.finalize())
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok()).collect()
}

//--------------------------------------     SessionMap     ----------------------------------------------------------

#[derive(Debug, Clone)]
struct Session {
    user_id: i64,
    login: String,
    expires_at: DateTime<Utc>,
}

/// Server-side session registry. Cloning shares the registry.
#[derive(Clone)]
pub struct SessionMap {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    idle_time: Duration,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::with_idle_time(Duration::minutes(SESSION_IDLE_MINUTES))
    }

    pub fn with_idle_time(idle_time: Duration) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), idle_time }
    }

    /// Create a session for a freshly authenticated user and return its token.
    pub fn issue(&self, user_id: i64, login: &str) -> String {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex_string(&raw);
        let session = Session { user_id, login: login.to_string(), expires_at: Utc::now() + self.idle_time };
        self.sessions.write().unwrap_or_else(|e| e.into_inner()).insert(token.clone(), session);
        token
    }

    /// The sliding idle window. Cookies naming these sessions live exactly this long too.
    pub fn idle_time(&self) -> Duration {
        self.idle_time
    }

    /// Look a token up, refreshing the sliding expiry on a hit and evicting on a miss.
    pub fn resolve(&self, token: &str) -> Option<AuthenticatedUser> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(token) {
            None => None,
            Some(session) if session.expires_at < Utc::now() => {
                sessions.remove(token);
                None
            },
            Some(session) => {
                session.expires_at = Utc::now() + self.idle_time;
                Some(AuthenticatedUser { user_id: session.user_id, login: session.login.clone() })
            },
        }
    }
}

impl Default for SessionMap {
    fn default() -> Self {
        Self::new()
    }
}

/// `max_age` is the issuing [`SessionMap`]'s idle window, so the cookie and the session it names
/// expire together.
pub(crate) fn session_cookie(token: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::seconds(max_age.num_seconds()))
        .finish()
}

//--------------------------------------  AuthenticatedUser ----------------------------------------------------------

/// Extractor for routes behind the session check. Resolution failure surfaces as 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub login: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .cookie(SESSION_COOKIE)
            .and_then(|cookie| {
                req.app_data::<web::Data<SessionMap>>().and_then(|sessions| sessions.resolve(cookie.value()))
            })
            .ok_or(ServerError::NotLoggedIn);
        ready(user)
    }
}
