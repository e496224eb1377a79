//! On-disk conversation store
//!
//! One JSON file per conversation, named `{id}__{name}.json`. The store is
//! driven by the layer above the orchestrator (save/rename/delete endpoints);
//! the orchestrator itself never touches it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::memory::Conversation;
use crate::{Error, Result};

/// Conversation persistence rooted at a single directory
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    /// Open (and create if needed) a store at the given directory
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The directory backing this store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every parseable conversation file, keyed by conversation id.
    /// Unreadable files are logged and skipped.
    pub fn load_all(&self) -> Result<HashMap<i64, Conversation>> {
        let mut conversations = HashMap::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load_file(&path) {
                Ok(conversation) => {
                    info!(path = %path.display(), "loaded conversation");
                    conversations.insert(conversation.id, conversation);
                }
                Err(err) => {
                    error!(path = %path.display(), %err, "failed loading conversation");
                }
            }
        }
        Ok(conversations)
    }

    /// Persist a conversation, replacing any file previously saved for its id
    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        self.remove_files_for(conversation.id)?;
        let path = self.path_for(conversation.id, &conversation.name);
        let data = serde_json::to_string(conversation)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Delete a conversation's file; missing ids are an error
    pub fn delete(&self, id: i64) -> Result<()> {
        let removed = self.remove_files_for(id)?;
        if removed == 0 {
            return Err(Error::Validation(format!(
                "conversation {id} does not exist"
            )));
        }
        Ok(())
    }

    /// Rename a saved conversation, rewriting its file
    pub fn rename(&self, id: i64, new_name: impl Into<String>) -> Result<()> {
        let mut conversation = self
            .load_all()?
            .remove(&id)
            .ok_or_else(|| Error::Validation(format!("conversation {id} does not exist")))?;
        conversation.name = new_name.into();
        self.save(&conversation)
    }

    fn load_file(path: &Path) -> Result<Conversation> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn path_for(&self, id: i64, name: &str) -> PathBuf {
        // spaces in names make awkward file names
        let name = name.replace(' ', "_");
        self.dir.join(format!("{id}__{name}.json"))
    }

    fn remove_files_for(&self, id: i64) -> Result<usize> {
        let prefix = format!("{id}__");
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_match = path.extension().and_then(|e| e.to_str()) == Some("json")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix));
            if is_match {
                std::fs::remove_file(path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::memory::Message;
    use tempfile::TempDir;

    fn sample(id: i64, name: &str) -> Conversation {
        let mut conversation = Conversation::new(id, name);
        conversation.add_message(Message::system("You are a pentest assistant"));
        conversation.add_message(Message::user("How do I enumerate SMB shares?"));
        conversation
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().expect("should create temp dir");
        let store = MemoryStore::new(temp.path()).expect("should open store");

        store.save(&sample(1, "smb recon")).expect("should save");

        let loaded = store.load_all().expect("should load");
        assert_eq!(loaded.len(), 1);
        let conversation = &loaded[&1];
        assert_eq!(conversation.name, "smb recon");
        assert_eq!(conversation.messages.len(), 2);
    }

    #[test]
    fn test_save_replaces_previous_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let store = MemoryStore::new(temp.path()).expect("should open store");

        store.save(&sample(1, "first")).expect("should save");
        store.save(&sample(1, "second")).expect("should save");

        let loaded = store.load_all().expect("should load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&1].name, "second");
    }

    #[test]
    fn test_delete() {
        let temp = TempDir::new().expect("should create temp dir");
        let store = MemoryStore::new(temp.path()).expect("should open store");

        store.save(&sample(3, "doomed")).expect("should save");
        store.delete(3).expect("should delete");

        assert!(store.load_all().expect("should load").is_empty());
    }

    #[test]
    fn test_delete_missing_id_is_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let store = MemoryStore::new(temp.path()).expect("should open store");

        assert!(store.delete(42).is_err());
    }

    #[test]
    fn test_rename() {
        let temp = TempDir::new().expect("should create temp dir");
        let store = MemoryStore::new(temp.path()).expect("should open store");

        store.save(&sample(5, "old name")).expect("should save");
        store.rename(5, "new name").expect("should rename");

        let loaded = store.load_all().expect("should load");
        assert_eq!(loaded[&5].name, "new name");
    }

    #[test]
    fn test_load_all_skips_corrupt_files() {
        let temp = TempDir::new().expect("should create temp dir");
        let store = MemoryStore::new(temp.path()).expect("should open store");

        store.save(&sample(1, "good")).expect("should save");
        std::fs::write(temp.path().join("2__bad.json"), "not json").expect("should write");

        let loaded = store.load_all().expect("should load");
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&1));
    }
}
