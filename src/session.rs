use rand::{distributions::Alphanumeric, Rng};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: u64,
    pub last_accessed: u64,
    pub data: HashMap<String, String>,
}

impl Session {
    pub fn new(id: String) -> Self {
        let now = current_timestamp();
        Session {
            id,
            created_at: now,
            last_accessed: now,
            data: HashMap::new(),
        }
    }

    pub fn is_expired(&self, now: u64, ttl: u64) -> bool {
        now > self.last_accessed + ttl
    }

    pub fn touch(&mut self) {
        self.last_accessed = current_timestamp();
    }
}

/// In-memory session map, owned by the event loop and mutated only between
/// handler invocations.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    ttl: u64,
    pub last_cleanup: Instant,
}

impl SessionStore {
    pub fn new(ttl: u64) -> Self {
        SessionStore {
            sessions: HashMap::new(),
            ttl,
            last_cleanup: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn generate_id() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    pub fn create(&mut self) -> String {
        let mut id = Self::generate_id();
        while self.sessions.contains_key(&id) {
            id = Self::generate_id();
        }
        self.sessions.insert(id.clone(), Session::new(id.clone()));
        id
    }

    /// True if the id refers to a live session; refreshes its timestamp.
    pub fn touch_session(&mut self, id: &str) -> bool {
        let now = current_timestamp();
        match self.sessions.get_mut(id) {
            Some(session) if !session.is_expired(now, self.ttl) => {
                session.touch();
                true
            }
            Some(_) => {
                self.sessions.remove(id);
                false
            }
            None => false,
        }
    }

    pub fn cleanup(&mut self) {
        let now = current_timestamp();
        let ttl = self.ttl;
        self.sessions.retain(|_, s| !s.is_expired(now, ttl));
        self.last_cleanup = Instant::now();
    }

    /// Cookie side channel on every response: server id, visit counter and
    /// a session id for clients that present none. A stale `session_id`
    /// cookie only refreshes the store; the counter keeps incrementing and
    /// no replacement session is minted.
    pub fn decorate_response(
        &mut self,
        request: &HttpRequest,
        response: &mut HttpResponse,
        hardened: bool,
    ) {
        response.add_cookie(&SetCookie::new("server", SERVER_SOFTWARE).hardened(hardened));

        let visits = match request.cookies.get("session_id") {
            Some(_) => request
                .cookies
                .get("visits")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
                + 1,
            None => 1,
        };
        response.add_cookie(
            &SetCookie::new("visits", &visits.to_string()).hardened(hardened),
        );

        match request.cookies.get("session_id") {
            Some(id) => {
                self.touch_session(id);
            }
            None => {
                let id = self.create();
                response.add_cookie(
                    &SetCookie::new("session_id", &id)
                        .max_age(3600)
                        .hardened(hardened),
                );
            }
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
