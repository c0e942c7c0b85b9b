use std::io;

use mcp_shared::RevisionOverflow;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;

pub type Result<T> = std::result::Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("no stored profile and no template for profile {0}")]
    ProfileNotConfigured(String),
    #[error("command not allowed on profile {0}")]
    InvalidProfile(String),
    #[error("unsupported command {0}")]
    UnsupportedCommand(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid stored data: {0}")]
    InvalidStoredData(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("command task failed: {0}")]
    Task(#[from] JoinError),
}

impl From<RevisionOverflow> for McpError {
    fn from(err: RevisionOverflow) -> Self {
        Self::InvalidStoredData(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// JSON error payload handed back to the HTTP layer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl McpError {
    /// Stable error code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProfileNotConfigured(_) => "operation_forbidden",
            Self::InvalidProfile(_) => "invalid_profile",
            Self::UnsupportedCommand(_) => "unsupported_command",
            Self::ItemNotFound(_) => "item_not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidStoredData(_) => "invalid_stored_data",
            Self::Io(_) | Self::Serialization(_) | Self::Task(_) => "server_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::ProfileNotConfigured(_) => 403,
            Self::InvalidProfile(_) | Self::UnsupportedCommand(_) | Self::InvalidRequest(_) => 400,
            Self::ItemNotFound(_) => 404,
            Self::InvalidStoredData(_) | Self::Io(_) | Self::Serialization(_) | Self::Task(_) => {
                500
            }
        }
    }

    /// Client errors are expected traffic; everything else is the server's fault.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            Self::ProfileNotConfigured(detail)
            | Self::InvalidProfile(detail)
            | Self::UnsupportedCommand(detail)
            | Self::ItemNotFound(detail)
            | Self::InvalidRequest(detail) => detail.clone(),
            Self::InvalidStoredData(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Task(_) => "internal_server_error".to_string(),
        };
        ErrorBody {
            error: self.code().to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(McpError::ProfileNotConfigured("x".into()).status_code(), 403);
        assert_eq!(McpError::InvalidProfile("x".into()).status_code(), 400);
        assert_eq!(McpError::UnsupportedCommand("x".into()).status_code(), 400);
        assert_eq!(McpError::ItemNotFound("x".into()).status_code(), 404);
        assert_eq!(McpError::InvalidStoredData("x".into()).status_code(), 500);
        assert_eq!(
            McpError::Io(io::Error::new(io::ErrorKind::Other, "disk")).status_code(),
            500
        );
    }

    #[test]
    fn test_body_carries_detail() {
        let body = McpError::UnsupportedCommand("PurchaseCatalogEntry".into()).to_body();
        assert_eq!(body.error, "unsupported_command");
        assert_eq!(body.message, "PurchaseCatalogEntry");

        let body = McpError::ProfileNotConfigured("campaign".into()).to_body();
        assert_eq!(body.error, "operation_forbidden");
        assert_eq!(body.message, "campaign");
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = McpError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "/secret/path"));
        let body = err.to_body();
        assert_eq!(body.error, "server_error");
        assert!(!body.message.contains("/secret/path"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_revision_overflow_is_stored_data() {
        let err = McpError::from(RevisionOverflow {
            revision: i64::MAX,
            command_revision: i64::MAX,
        });
        assert_eq!(err.code(), "invalid_stored_data");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_json_error_converts() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: McpError = parse_err.into();
        assert!(matches!(err, McpError::Serialization(_)));
    }
}
