//! Durable storage of profile documents, one pretty-printed JSON file per
//! (account, profile) pair:
//!
//! ```text
//! <data_dir>/<account>/profiles/<profile>.json
//! ```
//!
//! There is no cache. Every request reads the file and every mutating
//! command rewrites it. Callers that need read-modify-write atomicity hold
//! the pair's lock from [`crate::profile_locks`] around the whole sequence.

use crate::error::{McpError, Result};
use crate::templates::TemplateSource;
use crate::utils::{timestamp_now, Clock};
use log::info;
use mcp_shared::ProfileDocument;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ProfileStore {
    data_dir: PathBuf,
    templates: Arc<dyn TemplateSource>,
    clock: Arc<dyn Clock>,
}

impl ProfileStore {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        templates: Arc<dyn TemplateSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            templates,
            clock,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn profile_path(&self, account_id: &str, profile_id: &str) -> PathBuf {
        self.data_dir
            .join(account_id)
            .join("profiles")
            .join(format!("{}.json", profile_id))
    }

    /// Reads the stored document, `None` if the account never materialized it.
    pub fn load(&self, account_id: &str, profile_id: &str) -> Result<Option<ProfileDocument>> {
        validate_identifier("account", account_id)?;
        validate_identifier("profile", profile_id)?;
        read_document(&self.profile_path(account_id, profile_id))
    }

    pub fn load_template(&self, profile_id: &str) -> Result<Option<ProfileDocument>> {
        self.templates.load_template(profile_id)
    }

    /// Loads the stored document or materializes it from the template.
    ///
    /// A fresh copy gets the account as both `_id` and `accountId`, the
    /// current time as `created`/`updated`, and is written to disk before it
    /// is returned.
    pub fn get_or_create(&self, account_id: &str, profile_id: &str) -> Result<ProfileDocument> {
        if let Some(doc) = self.load(account_id, profile_id)? {
            return Ok(doc);
        }

        let mut doc = self
            .load_template(profile_id)?
            .ok_or_else(|| McpError::ProfileNotConfigured(profile_id.to_string()))?;

        doc.materialize_for(account_id, &timestamp_now(self.clock()));
        self.save(account_id, profile_id, &doc)?;

        info!(
            "Created profile {} for account {} from template",
            profile_id, account_id
        );
        Ok(doc)
    }

    pub fn save(&self, account_id: &str, profile_id: &str, doc: &ProfileDocument) -> Result<()> {
        validate_identifier("account", account_id)?;
        validate_identifier("profile", profile_id)?;
        write_document(&self.profile_path(account_id, profile_id), doc)
    }
}

/// Rejects names that would escape their directory once joined into a path.
pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value.starts_with('.')
        || value.contains("..")
        || value.contains(['/', '\\', '\0']);

    if invalid {
        return Err(McpError::InvalidRequest(format!(
            "invalid {} id {:?}",
            kind, value
        )));
    }
    Ok(())
}

pub(crate) fn read_document(path: &Path) -> Result<Option<ProfileDocument>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| McpError::InvalidStoredData(format!("{}: {}", path.display(), e)))
}

// Write to a sibling file first so a crash never leaves a truncated profile.
fn write_document(path: &Path, doc: &ProfileDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(doc)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::InMemoryTemplates;
    use crate::utils::FixedClock;
    use chrono::{TimeZone, Utc};
    use mcp_shared::AttrValue;
    use tempfile::TempDir;

    fn test_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()))
    }

    fn test_templates() -> Arc<dyn TemplateSource> {
        let mut templates = InMemoryTemplates::new();
        templates
            .insert_json(
                "common_core",
                r#"{"_id": "template", "accountId": "template", "rvn": 0, "commandRevision": 0,
                    "created": "0001-01-01T00:00:00Z", "updated": "0001-01-01T00:00:00Z",
                    "stats": {"attributes": {"allowed_to_receive_gifts": false}}}"#,
            )
            .unwrap();
        Arc::new(templates)
    }

    fn test_store(dir: &TempDir) -> ProfileStore {
        ProfileStore::new(dir.path(), test_templates(), test_clock())
    }

    #[test]
    fn test_load_missing_profile() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        assert!(store.load("acct", "common_core").unwrap().is_none());
    }

    #[test]
    fn test_get_or_create_stamps_template_copy() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let doc = store.get_or_create("acct", "common_core").unwrap();

        assert_eq!(doc.id, "acct");
        assert_eq!(doc.account_id, "acct");
        assert_eq!(doc.created, "2023-06-01T12:00:00Z");
        assert_eq!(doc.updated, "2023-06-01T12:00:00Z");
        assert_eq!(doc.revision, 0);
        assert!(store.profile_path("acct", "common_core").exists());
    }

    #[test]
    fn test_get_or_create_prefers_stored_document() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let mut doc = store.get_or_create("acct", "common_core").unwrap();
        let mut changes = Vec::new();
        doc.set_stat("allowed_to_receive_gifts", true, &mut changes);
        doc.bump_revision().unwrap();
        store.save("acct", "common_core", &doc).unwrap();

        let again = store.get_or_create("acct", "common_core").unwrap();
        assert_eq!(again.revision, 1);
        assert_eq!(again.stat("allowed_to_receive_gifts"), Some(&AttrValue::Bool(true)));
    }

    #[test]
    fn test_get_or_create_without_template() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let err = store.get_or_create("acct", "campaign").unwrap_err();
        match err {
            McpError::ProfileNotConfigured(profile) => assert_eq!(profile, "campaign"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!store.profile_path("acct", "campaign").exists());
    }

    #[test]
    fn test_large_integers_survive_save() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let mut doc = store.get_or_create("acct", "common_core").unwrap();
        let mut changes = Vec::new();
        doc.set_item_attribute("item-1", "xp", u64::MAX, &mut changes);
        store.save("acct", "common_core", &doc).unwrap();

        let raw = fs::read_to_string(store.profile_path("acct", "common_core")).unwrap();
        assert!(raw.contains("18446744073709551615"));
        let reloaded = store.load("acct", "common_core").unwrap().unwrap();
        assert_eq!(reloaded.item_attribute("item-1", "xp"), Some(&AttrValue::UInt(u64::MAX)));
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let mut doc = store.get_or_create("acct", "common_core").unwrap();
        let mut changes = Vec::new();
        doc.set_item_attribute("item-1", "favorite", true, &mut changes);
        doc.set_stat("loadouts", AttrValue::string_list(["a", ""]), &mut changes);
        doc.bump_revision().unwrap();
        store.save("acct", "common_core", &doc).unwrap();

        let reloaded = store.load("acct", "common_core").unwrap().unwrap();
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn test_save_is_pretty_printed_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        store.get_or_create("acct", "common_core").unwrap();
        let path = store.profile_path("acct", "common_core");
        let raw = fs::read_to_string(&path).unwrap();

        assert!(raw.contains("\n  \"_id\": \"acct\""));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_profile_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let path = store.profile_path("acct", "common_core");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{\"rvn\": \"seven\"}").unwrap();

        let err = store.get_or_create("acct", "common_core").unwrap_err();
        assert!(matches!(err, McpError::InvalidStoredData(_)));
        // Left alone for inspection rather than replaced by the template
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"rvn\": \"seven\"}");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("account", "ec0aa8e1b0b4").is_ok());
        assert!(validate_identifier("profile", "common_core").is_ok());

        for bad in ["", ".", "..", "../x", "a/b", "a\\b", ".hidden", "a..b"] {
            assert!(
                validate_identifier("account", bad).is_err(),
                "should reject {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_load_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let err = store.load("../../etc", "common_core").unwrap_err();
        assert!(matches!(err, McpError::InvalidRequest(_)));
    }
}
