//! Session memory kept across page reloads.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::model::SessionId;

pub const USERNAME_KEY: &str = "username";
pub const TEAM_ID_KEY: &str = "teamId";
pub const SESSION_ID_KEY: &str = "sessionId";

/// String key-value storage (LocalStorage in the browser).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> bool;
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&self, key: &str) {
        self.values.borrow_mut().remove(key);
    }
}

/// What the client remembers to rejoin a game silently.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedSession {
    pub username: Option<String>,
    pub team_id: Option<i64>,
    pub session_id: Option<SessionId>,
}

impl PersistedSession {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let number = |key| store.get(key).and_then(|v| v.trim().parse().ok());
        Self {
            username: store.get(USERNAME_KEY).filter(|s| !s.is_empty()),
            team_id: number(TEAM_ID_KEY),
            session_id: number(SESSION_ID_KEY),
        }
    }

    /// Writes present fields; absent ones are removed.
    pub fn save(&self, store: &dyn KeyValueStore) {
        let put = |key: &str, value: Option<String>| match value {
            Some(v) => {
                if !store.set(key, &v) {
                    tracing::warn!(key, "failed to persist value");
                }
            }
            None => store.remove(key),
        };
        put(USERNAME_KEY, self.username.clone());
        put(TEAM_ID_KEY, self.team_id.map(|v| v.to_string()));
        put(SESSION_ID_KEY, self.session_id.map(|v| v.to_string()));
    }

    /// Forgets the team and session but keeps the username.
    pub fn clear_game(store: &dyn KeyValueStore) {
        store.remove(SESSION_ID_KEY);
        store.remove(TEAM_ID_KEY);
    }

    pub fn can_rejoin(&self) -> bool {
        self.session_id.is_some() && self.team_id.is_some()
    }
}
