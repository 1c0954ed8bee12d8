//! JSON file rule store.
//!
//! Stores every rule and the filtering switch in one JSON document:
//!
//! ```json
//! { "filtering": true, "rules": [ { "name": "...", "path": "...", "action": "allow" } ] }
//! ```
//!
//! Each change rewrites the document through a temporary file and a rename,
//! so readers never observe a half-written file.

use super::traits::RuleStore;
use crate::models::{FirewallRule, RuleAction};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::instrument;

/// On-disk document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFile {
    #[serde(default)]
    filtering: bool,
    #[serde(default)]
    rules: Vec<FirewallRule>,
}

/// File-backed rule store.
#[derive(Debug)]
pub struct FileRuleStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileRuleStore {
    /// Opens a rule file, creating its parent directory if needed.
    ///
    /// A missing file is treated as an empty store with filtering off.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or an
    /// existing file cannot be parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::operation("create_rules_dir", e))?;
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        // Fail early on a corrupt file rather than at the first rebuild.
        store.read()?;
        Ok(store)
    }

    /// Returns the default rule file location.
    ///
    /// Returns `<data dir>/fwnotify/rules.json`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.data_dir().join("fwnotify").join("rules.json"))
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RuleFile> {
        if !self.path.exists() {
            return Ok(RuleFile::default());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| Error::operation("read_rules_file", e))?;
        if content.trim().is_empty() {
            return Ok(RuleFile::default());
        }

        serde_json::from_str(&content).map_err(|e| Error::operation("parse_rules_json", e))
    }

    fn write(&self, file: &RuleFile) -> Result<()> {
        let content = serde_json::to_string_pretty(file)
            .map_err(|e| Error::operation("serialize_rules", e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| Error::operation("write_rules_file", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::operation("replace_rules_file", e))
    }

    fn modify(&self, change: impl FnOnce(&mut RuleFile)) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| Error::operation("rules_file_lock", e))?;
        let mut file = self.read()?;
        change(&mut file);
        self.write(&file)
    }
}

impl RuleStore for FileRuleStore {
    fn rules(&self) -> Result<Vec<FirewallRule>> {
        Ok(self.read()?.rules)
    }

    #[instrument(skip(self), fields(operation = "add_rule", backend = "file"))]
    fn add_rule(&self, path: &str, action: RuleAction) -> Result<()> {
        if path.is_empty() {
            return Err(Error::InvalidInput("rule path is empty".to_string()));
        }
        let rule = FirewallRule::outbound(path, action);
        self.modify(|file| file.rules.push(rule))
    }

    fn filtering(&self) -> Result<bool> {
        Ok(self.read()?.filtering)
    }

    fn set_filtering(&self, enabled: bool) -> Result<()> {
        self.modify(|file| file.filtering = enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileRuleStore) {
        let dir = TempDir::new().unwrap();
        let store = FileRuleStore::open(dir.path().join("nested").join("rules.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.rules().unwrap().is_empty());
        assert!(!store.filtering().unwrap());
        assert!(store.path().parent().unwrap().exists());
    }

    #[test]
    fn test_add_rule_persists() {
        let (_dir, store) = store();
        store.add_rule(r"C:\Tools\App.exe", RuleAction::Block).unwrap();

        let reopened = FileRuleStore::open(store.path()).unwrap();
        let rules = reopened.rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].path, r"C:\Tools\App.exe");
        assert_eq!(rules[0].action, RuleAction::Block);
        assert_eq!(reopened.enumerate().unwrap(), vec![r"c:\tools\app.exe".to_string()]);
    }

    #[test]
    fn test_filtering_persists() {
        let (_dir, store) = store();
        store.set_filtering(true).unwrap();
        assert!(FileRuleStore::open(store.path()).unwrap().filtering().unwrap());
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileRuleStore::open(&path),
            Err(Error::OperationFailed { .. })
        ));
    }

    #[test]
    fn test_empty_path_rejected() {
        let (_dir, store) = store();
        assert!(store.add_rule("", RuleAction::Allow).is_err());
        assert!(!store.path().exists());
    }
}
