// Session Store
//
// Per-visitor dataset registry and chat history, keyed by session id.
// Idle sessions expire after a TTL; when the store is full the least
// recently used session is evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::api::middleware::AppError;
use crate::config::SessionConfig;
use crate::models::{ChatEntry, Table};

/// Datasets, active selection and chat history of one visitor
#[derive(Debug, Clone)]
pub struct Session {
    /// Registered datasets in upload order, unique by name
    pub datasets: Vec<Table>,
    pub active: Option<String>,
    pub history: Vec<ChatEntry>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            datasets: Vec::new(),
            active: None,
            history: Vec::new(),
            last_seen: Instant::now(),
        }
    }

    fn is_expired(&self, idle_ttl: Duration) -> bool {
        self.last_seen.elapsed() > idle_ttl
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets.iter().map(|t| t.name.clone()).collect()
    }

    pub fn dataset(&self, name: &str) -> Option<&Table> {
        self.datasets.iter().find(|t| t.name == name)
    }

    pub fn active_table(&self) -> Option<&Table> {
        self.active.as_deref().and_then(|name| self.dataset(name))
    }

    pub fn last_entry(&self) -> Option<&ChatEntry> {
        self.history.last()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub created: u64,
    pub expirations: u64,
    pub evictions: u64,
}

pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    max_sessions: usize,
    idle_ttl: Duration,
    stats: Arc<Mutex<SessionStats>>,
}

impl SessionStore {
    pub fn new(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            max_sessions: max_sessions.max(1),
            idle_ttl,
            stats: Arc::new(Mutex::new(SessionStats::default())),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_sessions, Duration::from_secs(config.idle_ttl_secs))
    }

    /// Resolve a client-supplied session id, creating a fresh session when the
    /// id is missing, unknown or expired. Returns the id to use from now on.
    pub fn get_or_create(&self, id: Option<&str>) -> String {
        let mut sessions = self.sessions.lock().unwrap();

        if let Some(id) = id {
            match sessions.get_mut(id) {
                Some(session) if !session.is_expired(self.idle_ttl) => {
                    session.last_seen = Instant::now();
                    return id.to_string();
                }
                Some(_) => {
                    sessions.remove(id);
                    self.stats.lock().unwrap().expirations += 1;
                    tracing::debug!("Session expired: {}", id);
                }
                None => {}
            }
        }

        if sessions.len() >= self.max_sessions {
            self.evict(&mut sessions);
        }

        let id = Uuid::new_v4().to_string();
        sessions.insert(id.clone(), Session::new());
        self.stats.lock().unwrap().created += 1;
        tracing::debug!("Created session {} (sessions: {})", id, sessions.len());
        id
    }

    /// Make room for one session: drop expired ones first, then the least recently used
    fn evict(&self, sessions: &mut HashMap<String, Session>) {
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.idle_ttl));
        let expired = before - sessions.len();
        if expired > 0 {
            self.stats.lock().unwrap().expirations += expired as u64;
        }
        if sessions.len() < self.max_sessions {
            return;
        }

        let oldest = sessions
            .iter()
            .min_by_key(|(_, s)| s.last_seen)
            .map(|(id, _)| id.clone());
        if let Some(oldest) = oldest {
            sessions.remove(&oldest);
            self.stats.lock().unwrap().evictions += 1;
            tracing::info!("Evicted least recently used session: {}", oldest);
        }
    }

    /// Run `f` against a live session, refreshing its idle timer
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Result<R, AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(id)
            .filter(|s| !s.is_expired(self.idle_ttl))
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
        session.last_seen = Instant::now();
        Ok(f(session))
    }

    /// Register tables, replacing any with the same name; the first one becomes active
    pub fn add_datasets(&self, id: &str, tables: Vec<Table>) -> Result<Vec<String>, AppError> {
        self.with_session(id, |session| {
            let mut added = Vec::with_capacity(tables.len());
            for table in tables {
                added.push(table.name.clone());
                match session.datasets.iter_mut().find(|t| t.name == table.name) {
                    Some(existing) => *existing = table,
                    None => session.datasets.push(table),
                }
            }
            if let Some(first) = added.first() {
                session.active = Some(first.clone());
            }
            added
        })
    }

    pub fn set_active(&self, id: &str, name: &str) -> Result<(), AppError> {
        self.with_session(id, |session| {
            if session.dataset(name).is_none() {
                return Err(AppError::NotFound(format!("Dataset '{}' not found", name)));
            }
            session.active = Some(name.to_string());
            Ok(())
        })?
    }

    pub fn active_table(&self, id: &str) -> Result<Option<Table>, AppError> {
        self.with_session(id, |session| session.active_table().cloned())
    }

    pub fn append_history(&self, id: &str, entry: ChatEntry) -> Result<(), AppError> {
        self.with_session(id, |session| session.history.push(entry))
    }

    pub fn history(&self, id: &str) -> Result<Vec<ChatEntry>, AppError> {
        self.with_session(id, |session| session.history.clone())
    }

    /// Remove every idle session, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.idle_ttl));
        let purged = before - sessions.len();

        if purged > 0 {
            self.stats.lock().unwrap().expirations += purged as u64;
            tracing::info!("Purged {} expired sessions", purged);
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_stats(&self) -> SessionStats {
        self.stats.lock().unwrap().clone()
    }
}
