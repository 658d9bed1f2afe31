//! In-memory conversation sessions

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub state: Map<String, Value>,
    pub last_update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    app_name: String,
    user_id: String,
    session_id: String,
}

impl SessionKey {
    fn new(app_name: &str, user_id: &str, session_id: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

/// Sessions keyed by app, user and session id; lost on restart
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the session or merge `state` into an existing one
    pub async fn upsert(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        state: Map<String, Value>,
    ) -> Session {
        let key = SessionKey::new(app_name, user_id, session_id);
        let mut sessions = self.sessions.write().await;

        let session = sessions.entry(key).or_insert_with(|| Session {
            id: session_id.to_string(),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state: Map::new(),
            last_update_time: Utc::now(),
        });
        session.state.extend(state);
        session.last_update_time = Utc::now();
        session.clone()
    }

    pub async fn get(&self, app_name: &str, user_id: &str, session_id: &str) -> Option<Session> {
        let key = SessionKey::new(app_name, user_id, session_id);
        self.sessions.read().await.get(&key).cloned()
    }

    /// Merge values into an existing session; `None` if it does not exist
    pub async fn merge_state<I>(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
        values: I,
    ) -> Option<Session>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let key = SessionKey::new(app_name, user_id, session_id);
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&key)?;

        session
            .state
            .extend(values.into_iter().map(|(k, v)| (k, Value::String(v))));
        session.last_update_time = Utc::now();
        Some(session.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_merges() {
        let store = SessionStore::new();

        let created = store
            .upsert(
                "test_agents",
                "u",
                "f.pdf",
                state(json!({"preferred_language": "English", "visit_count": 5})),
            )
            .await;
        assert_eq!(created.id, "f.pdf");
        assert_eq!(created.state["visit_count"], 5);

        let updated = store
            .upsert("test_agents", "u", "f.pdf", state(json!({"visit_count": 6})))
            .await;
        assert_eq!(updated.state["visit_count"], 6);
        assert_eq!(updated.state["preferred_language"], "English");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_scoped_by_user() {
        let store = SessionStore::new();
        store.upsert("app", "alice", "s1", Map::new()).await;

        assert!(store.get("app", "alice", "s1").await.is_some());
        assert!(store.get("app", "bob", "s1").await.is_none());
    }

    #[tokio::test]
    async fn test_merge_state_requires_existing_session() {
        let store = SessionStore::new();
        assert!(store
            .merge_state("app", "u", "missing", vec![("k".into(), "v".into())])
            .await
            .is_none());

        store.upsert("app", "u", "s", Map::new()).await;
        let session = store
            .merge_state("app", "u", "s", vec![("product".into(), "A-100".into())])
            .await
            .unwrap();
        assert_eq!(session.state["product"], "A-100");
    }
}
