//! # Profile Command Server Library
//!
//! This library implements the profile mutation protocol of the emulated game
//! backend. Clients send named commands against one of their profile
//! documents; the server applies them, tracks revisions, returns only the
//! delta of what changed, and persists the result to disk.
//!
//! ## Core Responsibilities
//!
//! ### Versioned Documents
//! Each (account, profile) pair owns one JSON document with a revision
//! counter. Every command that changes something bumps the revision exactly
//! once. Commands that change nothing, and commands that fail, leave it alone.
//!
//! ### Delta Responses
//! Replies carry the revision the client's view was based on, the new
//! revision, and the ordered list of change records the command produced.
//! Clients replay those records instead of refetching the whole profile.
//!
//! ### Lazy Materialization
//! The first request for a profile copies a read-only template, stamps it
//! with the account and creation time, and writes it out before the command
//! runs.
//!
//! ## Module Organization
//!
//! ### Store Module (`store`)
//! File-backed load/save of profile documents, template fallback and
//! identifier validation.
//!
//! ### Templates Module (`templates`)
//! The `TemplateSource` seam with directory and in-memory implementations.
//!
//! ### Commands Module (`commands`)
//! Command lookup, profile checks and the handlers themselves.
//!
//! ### Response Module (`response`)
//! Assembles the reply envelope around a command's change list.
//!
//! ### Profile Locks Module (`profile_locks`)
//! Per-profile async mutexes so two commands for the same document never
//! interleave their read-modify-write.
//!
//! ### Service Module (`service`)
//! `ProfileService`, the single entry point the HTTP layer calls.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use mcp_server::config::StoreConfig;
//! use mcp_server::service::ProfileService;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Profiles under ./config/<account>/profiles, templates under ./config/templates
//!     let service = ProfileService::from_config(&StoreConfig::default());
//!     let _reaper = service.spawn_lock_reaper(Duration::from_secs(60));
//!
//!     let response = service
//!         .execute(
//!             "ec0aa8e1b0b4",
//!             Some("common_core"),
//!             "SetReceiveGiftsEnabled",
//!             br#"{"bReceiveGifts": true}"#,
//!         )
//!         .await?;
//!
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! Errors carry a stable code and an HTTP status through
//! [`error::McpError::code`] and [`error::McpError::status_code`]; turning
//! them into an actual HTTP response is left to the caller.

pub mod commands;
pub mod config;
pub mod error;
pub mod profile_locks;
pub mod response;
pub mod service;
pub mod store;
pub mod templates;
pub mod utils;

pub use error::{McpError, Result};
pub use service::ProfileService;
