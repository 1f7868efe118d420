//! The two persisted client identifiers.

use std::sync::Arc;

use super::{KeyValueStore, Persisted, PersistenceError};
use crate::session::{Identity, SessionId};

pub const SESSION_ID_KEY: &str = "session_id";
pub const USER_ID_KEY: &str = "user_id";

/// Session id and user id, each bound to its own key.
pub struct IdentityStore {
    session_id: Persisted<Option<SessionId>>,
    user_id: Persisted<Option<String>>,
}

impl IdentityStore {
    pub fn new(medium: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session_id: Persisted::new(Arc::clone(&medium), SESSION_ID_KEY, None),
            user_id: Persisted::new(medium, USER_ID_KEY, None),
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id.get()
    }

    pub fn set_session_id(&self, id: Option<SessionId>) -> Result<(), PersistenceError> {
        self.session_id.set(id)
    }

    /// Forget the session id. Persistence failures are logged, not returned.
    pub fn clear_session_id(&self) {
        if let Err(e) = self.session_id.set(None) {
            log::warn!("Failed to persist cleared session id: {}", e);
        }
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.get()
    }

    pub fn set_user_id(&self, id: Option<String>) -> Result<(), PersistenceError> {
        self.user_id.set(id)
    }

    pub fn snapshot(&self) -> Identity {
        Identity {
            session_id: self.session_id(),
            user_id: self.user_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn starts_empty() {
        let store = IdentityStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.snapshot(), Identity::default());
    }

    #[test]
    fn loads_existing_values() {
        let medium = MemoryStore::new();
        medium.insert_raw(SESSION_ID_KEY, "\"sess-42\"");
        medium.insert_raw(USER_ID_KEY, "\"user-1\"");

        let store = IdentityStore::new(Arc::new(medium));
        assert_eq!(store.session_id(), Some(SessionId::from("sess-42")));
        assert_eq!(store.user_id().as_deref(), Some("user-1"));
    }

    #[test]
    fn survives_restart() {
        let medium = MemoryStore::new();
        {
            let store = IdentityStore::new(Arc::new(medium.clone()));
            store.set_session_id(Some(SessionId::from("sess-7"))).unwrap();
            store.set_user_id(Some("user-7".to_string())).unwrap();
        }

        let store = IdentityStore::new(Arc::new(medium));
        assert_eq!(store.session_id(), Some(SessionId::from("sess-7")));
        assert_eq!(store.user_id().as_deref(), Some("user-7"));
    }

    #[test]
    fn clear_session_keeps_user() {
        let medium = MemoryStore::new();
        let store = IdentityStore::new(Arc::new(medium.clone()));
        store.set_session_id(Some(SessionId::from("sess-1"))).unwrap();
        store.set_user_id(Some("user-1".to_string())).unwrap();

        store.clear_session_id();

        assert_eq!(store.session_id(), None);
        assert_eq!(store.user_id().as_deref(), Some("user-1"));
        assert_eq!(medium.raw(SESSION_ID_KEY).as_deref(), Some("null"));
    }
}
