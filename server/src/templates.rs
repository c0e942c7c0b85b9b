//! Read-only seed documents used the first time an account touches a profile.

use crate::error::{McpError, Result};
use crate::store::{read_document, validate_identifier};
use log::debug;
use mcp_shared::ProfileDocument;
use std::collections::HashMap;
use std::path::PathBuf;

/// Supplies the template for a profile name, or `None` when that profile is
/// not configured.
pub trait TemplateSource: Send + Sync {
    fn load_template(&self, profile_id: &str) -> Result<Option<ProfileDocument>>;
}

/// Templates stored as `<dir>/<profile>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn template_path(&self, profile_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", profile_id))
    }
}

impl TemplateSource for DirectoryTemplates {
    fn load_template(&self, profile_id: &str) -> Result<Option<ProfileDocument>> {
        validate_identifier("profile", profile_id)?;
        let path = self.template_path(profile_id);
        let template = read_document(&path)?;
        if template.is_none() {
            debug!("No template at {}", path.display());
        }
        Ok(template)
    }
}

/// Templates held in memory, for tests and embedders that ship their own.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates {
    templates: HashMap<String, ProfileDocument>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, profile_id: &str, template: ProfileDocument) -> Self {
        self.insert(profile_id, template);
        self
    }

    pub fn insert(&mut self, profile_id: &str, template: ProfileDocument) {
        self.templates.insert(profile_id.to_string(), template);
    }

    /// Parses a JSON template, failing on malformed input.
    pub fn insert_json(&mut self, profile_id: &str, json: &str) -> Result<()> {
        let template: ProfileDocument = serde_json::from_str(json)
            .map_err(|e| McpError::InvalidStoredData(format!("template {}: {}", profile_id, e)))?;
        self.insert(profile_id, template);
        Ok(())
    }
}

impl TemplateSource for InMemoryTemplates {
    fn load_template(&self, profile_id: &str) -> Result<Option<ProfileDocument>> {
        Ok(self.templates.get(profile_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_template_found() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("common_core.json"),
            r#"{"_id": "", "rvn": 1, "commandRevision": 1, "stats": {"attributes": {"mfa_enabled": true}}}"#,
        )
        .unwrap();

        let templates = DirectoryTemplates::new(dir.path());
        let template = templates.load_template("common_core").unwrap().unwrap();

        assert_eq!(template.revision, 1);
        assert_eq!(template.stat("mfa_enabled").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn test_directory_template_missing() {
        let dir = TempDir::new().unwrap();
        let templates = DirectoryTemplates::new(dir.path());
        assert!(templates.load_template("campaign").unwrap().is_none());
    }

    #[test]
    fn test_directory_template_corrupt() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("athena.json"), "{ nope").unwrap();

        let templates = DirectoryTemplates::new(dir.path());
        let err = templates.load_template("athena").unwrap_err();
        assert!(matches!(err, McpError::InvalidStoredData(_)));
    }

    #[test]
    fn test_directory_template_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let templates = DirectoryTemplates::new(dir.path());
        let err = templates.load_template("../secrets").unwrap_err();
        assert!(matches!(err, McpError::InvalidRequest(_)));
    }

    #[test]
    fn test_in_memory_templates() {
        let mut templates = InMemoryTemplates::new();
        templates.insert_json("athena", r#"{"rvn": 7}"#).unwrap();

        assert_eq!(templates.load_template("athena").unwrap().unwrap().revision, 7);
        assert!(templates.load_template("common_core").unwrap().is_none());
        assert!(templates.insert_json("broken", "[").is_err());
    }
}
