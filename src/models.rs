//! Chat data model: sessions, messages, recommendations
//!
//! The persisted collection maps session ids to message lists. Session ids
//! are Unix milliseconds at creation, so they double as the creation date.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full persisted collection, keyed by session id
pub type SessionCollection = BTreeMap<String, Vec<Message>>;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Content is a JSON list of [`Recommendation`]
    Recommendations,
    Error,
}

/// A message in a chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Error, content)
    }

    /// Recommendation cards stored as a serialized list
    pub fn recommendations(books: &[Recommendation]) -> serde_json::Result<Self> {
        Ok(Self::new(Role::Recommendations, serde_json::to_string(books)?))
    }

    /// Decode the card list of a `recommendations` message
    pub fn parse_recommendations(&self) -> serde_json::Result<Vec<Recommendation>> {
        serde_json::from_str(&self.content)
    }
}

/// A book suggested by the recommendation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub reading_time: String,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

/// Allocate an id newer than every numeric id in `existing` and than
/// `last_issued`, which covers ids handed out and since deleted
pub fn next_session_id(existing: &SessionCollection, last_issued: i64, now: DateTime<Utc>) -> i64 {
    let newest = existing
        .keys()
        .filter_map(|id| id.parse::<i64>().ok())
        .max()
        .unwrap_or(i64::MIN)
        .max(last_issued);
    now.timestamp_millis().max(newest.saturating_add(1))
}

/// Creation instant encoded in a session id, if it is numeric
pub fn session_created_at(id: &str) -> Option<DateTime<Local>> {
    let ms = id.parse::<i64>().ok()?;
    Local.timestamp_millis_opt(ms).single()
}

/// Session ids ordered newest first
pub fn ids_newest_first(collection: &SessionCollection) -> Vec<&String> {
    let mut ids: Vec<&String> = collection.keys().collect();
    ids.sort_by(|a, b| {
        let key = |id: &str| id.parse::<i64>().ok();
        key(b).cmp(&key(a)).then_with(|| b.cmp(a))
    });
    ids
}

/// Most recently created session
pub fn newest_session_id(collection: &SessionCollection) -> Option<String> {
    ids_newest_first(collection).first().map(|id| (*id).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str) -> Recommendation {
        Recommendation {
            title: title.into(),
            category: "Fantasy".into(),
            reading_time: "5 min read".into(),
            themes: vec!["magic".into()],
            summary: "A quest.".into(),
            similarity_score: None,
        }
    }

    #[test]
    fn test_message_serialize() {
        let msg = Message::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"user""#));
        assert!(json.contains("Hello"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_recommendations_message_content() {
        let msg = Message::recommendations(&[book("The Hobbit")]).unwrap();
        assert_eq!(msg.role, Role::Recommendations);
        assert!(msg.content.starts_with('['));
        assert_eq!(msg.parse_recommendations().unwrap()[0].title, "The Hobbit");
    }

    #[test]
    fn test_recommendation_defaults_for_sparse_payload() {
        let rec: Recommendation =
            serde_json::from_str(r#"{"title":"Dune","summary":"Spice.","category":"Science Fiction","similarity_score":0.4}"#)
                .unwrap();
        assert!(rec.themes.is_empty());
        assert_eq!(rec.reading_time, "");
        assert_eq!(rec.similarity_score, Some(0.4));
    }

    #[test]
    fn test_next_session_id_is_monotonic() {
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        let mut chats = SessionCollection::new();
        assert_eq!(next_session_id(&chats, i64::MIN, now), 1000);

        chats.insert("5000".into(), vec![]);
        chats.insert("imported-chat".into(), vec![]);
        assert_eq!(next_session_id(&chats, i64::MIN, now), 5001);
    }

    #[test]
    fn test_next_session_id_skips_deleted_ids() {
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        let chats = SessionCollection::new();
        assert_eq!(next_session_id(&chats, 1_000, now), 1001);
        assert_eq!(next_session_id(&chats, 7, now), 1000);
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut chats = SessionCollection::new();
        chats.insert("999".into(), vec![]);
        chats.insert("1000".into(), vec![]);
        chats.insert("legacy".into(), vec![]);

        let ids: Vec<_> = ids_newest_first(&chats).into_iter().cloned().collect();
        assert_eq!(ids, vec!["1000", "999", "legacy"]);
        assert_eq!(newest_session_id(&chats).as_deref(), Some("1000"));
    }

    #[test]
    fn test_created_at_from_id() {
        assert!(session_created_at("1700000000000").is_some());
        assert!(session_created_at("legacy").is_none());
    }
}
