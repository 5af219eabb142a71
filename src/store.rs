//! Chat persistence - the whole collection in one JSON document
//!
//! Every mutation is load-modify-save against the file, and every save
//! replaces the file atomically (temp file + rename), so readers never see
//! a half-written collection.

use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ChatError, ChatResult};
use crate::models::{Message, SessionCollection};

/// File-backed chat collection
#[derive(Debug, Clone)]
pub struct ChatStore {
    path: PathBuf,
}

impl ChatStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default state location
    pub fn open_default() -> anyhow::Result<Self> {
        let path = crate::config::chats_path()?;
        Ok(Self::open(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the collection. Missing or unreadable data yields an empty one.
    pub fn load(&self) -> SessionCollection {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SessionCollection::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read chats, starting empty");
                return SessionCollection::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(chats) => chats,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "chats file is corrupt, starting empty");
                SessionCollection::new()
            }
        }
    }

    /// Replace the persisted collection
    pub fn save(&self, chats: &SessionCollection) -> ChatResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content =
            serde_json::to_vec(chats).map_err(|e| ChatError::Storage(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Append a message to a session, creating the session if needed
    pub fn append(&mut self, session_id: &str, message: Message) -> ChatResult<SessionCollection> {
        let mut chats = self.load();
        chats.entry(session_id.to_string()).or_default().push(message);
        self.save(&chats)?;
        Ok(chats)
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete(&mut self, session_id: &str) -> ChatResult<bool> {
        let mut chats = self.load();
        let existed = chats.remove(session_id).is_some();
        self.save(&chats)?;
        Ok(existed)
    }

    pub fn messages(&self, session_id: &str) -> Option<Vec<Message>> {
        self.load().remove(session_id)
    }

    /// Persisted bytes, exactly as stored
    pub fn export(&self) -> ChatResult<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(b"{}".to_vec()),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge an exported collection into the store.
    ///
    /// Imported sessions replace existing sessions with the same id wholesale;
    /// message lists are not concatenated. Nothing is written if the bytes do
    /// not parse.
    pub fn import(&mut self, bytes: &[u8]) -> ChatResult<SessionCollection> {
        let imported: SessionCollection =
            serde_json::from_slice(bytes).map_err(|e| ChatError::Import(e.to_string()))?;

        let mut chats = self.load();
        chats.extend(imported);
        self.save(&chats)?;
        Ok(chats)
    }
}

/// Download name for an export made on `date`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("book-chats-{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn temp_store() -> (tempfile::TempDir, ChatStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::open(dir.path().join("chats.json"));
        (dir, store)
    }

    #[test]
    fn test_load_missing_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_append_creates_session() {
        let (_dir, mut store) = temp_store();
        store.append("1", Message::user("fantasy please")).unwrap();
        let chats = store.append("1", Message::assistant("Try The Hobbit")).unwrap();

        assert_eq!(chats["1"].len(), 2);
        assert_eq!(chats["1"][1].role, Role::Assistant);
        assert_eq!(store.load(), chats);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let (dir, mut store) = temp_store();
        store.append("1", Message::user("hi")).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["chats.json"]);
    }

    #[test]
    fn test_delete() {
        let (_dir, mut store) = temp_store();
        store.append("1", Message::user("a")).unwrap();
        store.append("2", Message::user("b")).unwrap();

        assert!(store.delete("1").unwrap());
        assert!(!store.delete("1").unwrap());
        assert_eq!(store.load().keys().collect::<Vec<_>>(), vec!["2"]);
    }

    #[test]
    fn test_export_is_byte_identical() {
        let (_dir, mut store) = temp_store();
        assert_eq!(store.export().unwrap(), b"{}");

        store.append("1", Message::user("a")).unwrap();
        assert_eq!(store.export().unwrap(), fs::read(store.path()).unwrap());
    }

    #[test]
    fn test_import_roundtrip_into_empty() {
        let (_dir, mut source) = temp_store();
        source.append("1", Message::user("a")).unwrap();
        let original = source.append("2", Message::assistant("b")).unwrap();
        let bytes = source.export().unwrap();

        let (_dir2, mut target) = temp_store();
        let merged = target.import(&bytes).unwrap();
        assert_eq!(merged, original);
    }

    #[test]
    fn test_import_replaces_colliding_sessions() {
        let (_dir, mut store) = temp_store();
        let msg_a = Message::user("A original");
        store.append("A", msg_a).unwrap();

        let msg_a2 = Message::user("A imported");
        let msg_b = Message::user("B imported");
        let mut incoming = SessionCollection::new();
        incoming.insert("A".into(), vec![msg_a2.clone()]);
        incoming.insert("B".into(), vec![msg_b.clone()]);

        let merged = store.import(&serde_json::to_vec(&incoming).unwrap()).unwrap();
        assert_eq!(merged["A"], vec![msg_a2]);
        assert_eq!(merged["B"], vec![msg_b]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_import_failure_preserves_state() {
        let (_dir, mut store) = temp_store();
        store.append("1", Message::user("keep me")).unwrap();
        let before = fs::read(store.path()).unwrap();

        let err = store.import(b"[1, 2").unwrap_err();
        assert!(matches!(err, ChatError::Import(_)));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(export_file_name(date), "book-chats-2026-10-16.json");
    }
}
