//! Cookie-based sessions with sliding expiry.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, info};

use smscr_exec::{RcCookie, SharedParameters};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

const SID_LENGTH: usize = 20;

#[derive(Debug)]
struct SessionEntry {
    host: String,
    valid_until: DateTime<Utc>,
    parameters: SharedParameters,
}

/// The outcome of looking up a request's session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub parameters: SharedParameters,
    /// Cookie to send back when a new session was created.
    pub cookie: Option<RcCookie>,
}

/// All live sessions, keyed by session id.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Find the session for `sid` on `host`, or start a new one.
    ///
    /// An unknown id, an id bound to another host or an expired session all
    /// start a new session. A valid session has its expiry pushed forward.
    pub fn resolve(&self, sid: Option<&str>, host: &str) -> Session {
        self.resolve_at(sid, host, Utc::now())
    }

    pub fn resolve_at(&self, sid: Option<&str>, host: &str, now: DateTime<Utc>) -> Session {
        let mut sessions = self.sessions.lock();

        if let Some(sid) = sid {
            let live = sessions
                .get_mut(sid)
                .filter(|entry| entry.host == host && entry.valid_until > now);
            if let Some(entry) = live {
                entry.valid_until = now + self.timeout;
                return Session {
                    id: sid.to_string(),
                    parameters: entry.parameters.clone(),
                    cookie: None,
                };
            }
            // A live session bound to another host stays untouched.
            if sessions.get(sid).is_some_and(|entry| entry.valid_until <= now) {
                sessions.remove(sid);
                debug!(sid, "dropping expired session");
            }
        }

        let mut rng = rand::thread_rng();
        let id = loop {
            let candidate = generate_sid(&mut rng);
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let parameters = SharedParameters::default();
        sessions.insert(
            id.clone(),
            SessionEntry {
                host: host.to_string(),
                valid_until: now + self.timeout,
                parameters: parameters.clone(),
            },
        );
        debug!(sid = %id, host, "created session");

        let cookie = RcCookie::new(SESSION_COOKIE, id.as_str())
            .with_domain(host)
            .with_path("/")
            .http_only();
        Session {
            id,
            parameters,
            cookie: Some(cookie),
        }
    }

    /// Remove expired sessions; returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.valid_until > now);
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "swept expired sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn valid_until(&self, sid: &str) -> Option<DateTime<Utc>> {
        self.sessions.lock().get(sid).map(|entry| entry.valid_until)
    }
}

/// A random id of uppercase ASCII letters.
fn generate_sid(rng: &mut impl Rng) -> String {
    (0..SID_LENGTH)
        .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> SessionStore {
        SessionStore::new(Duration::seconds(600))
    }

    #[test]
    fn test_new_session_sets_cookie() {
        let store = store();
        let now = Utc::now();
        let session = store.resolve_at(None, "localhost", now);

        assert_eq!(session.id.len(), SID_LENGTH);
        assert!(session.id.chars().all(|c| c.is_ascii_uppercase()));
        let cookie = session.cookie.unwrap();
        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.value, session.id);
        assert_eq!(cookie.domain.as_deref(), Some("localhost"));
        assert_eq!(cookie.path.as_deref(), Some("/"));
        assert!(cookie.http_only);
        assert_eq!(store.valid_until(&session.id), Some(now + Duration::seconds(600)));
    }

    #[test]
    fn test_existing_session_is_reused_and_refreshed() {
        let store = store();
        let start = Utc::now();
        let first = store.resolve_at(None, "localhost", start);
        first.parameters.lock().insert("bgcolor".into(), "FF0000".into());

        let later = start + Duration::seconds(100);
        let second = store.resolve_at(Some(&first.id), "localhost", later);
        assert_eq!(second.id, first.id);
        assert!(second.cookie.is_none());
        assert_eq!(second.parameters.lock().get("bgcolor").map(String::as_str), Some("FF0000"));
        assert_eq!(store.valid_until(&first.id), Some(later + Duration::seconds(600)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expired_session_is_replaced() {
        let store = store();
        let start = Utc::now();
        let first = store.resolve_at(None, "localhost", start);

        let second = store.resolve_at(Some(&first.id), "localhost", start + Duration::seconds(601));
        assert_ne!(second.id, first.id);
        assert!(second.cookie.is_some());
        assert_eq!(store.valid_until(&first.id), None);
    }

    #[test]
    fn test_other_host_gets_new_session() {
        let store = store();
        let now = Utc::now();
        let first = store.resolve_at(None, "a.example", now);
        let second = store.resolve_at(Some(&first.id), "b.example", now);
        assert_ne!(second.id, first.id);
        assert!(second.cookie.is_some());

        assert_eq!(store.valid_until(&first.id), Some(now + Duration::seconds(600)));
        let again = store.resolve_at(Some(&first.id), "a.example", now);
        assert_eq!(again.id, first.id);
        assert!(again.cookie.is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unknown_sid_gets_new_session() {
        let store = store();
        let session = store.resolve_at(Some("NOSUCHSESSION"), "localhost", Utc::now());
        assert_ne!(session.id, "NOSUCHSESSION");
        assert!(session.cookie.is_some());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = store();
        let start = Utc::now();
        store.resolve_at(None, "localhost", start);
        let fresh = store.resolve_at(None, "localhost", start + Duration::seconds(300));

        assert_eq!(store.sweep_at(start + Duration::seconds(700)), 1);
        assert_eq!(store.len(), 1);
        assert!(store.valid_until(&fresh.id).is_some());
    }
}
