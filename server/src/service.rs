//! Entry point the HTTP layer calls for every profile command

use crate::commands::{self, Command};
use crate::config::StoreConfig;
use crate::error::{McpError, Result};
use crate::profile_locks::{ProfileKey, ProfileLocks};
use crate::response::ResponseAssembler;
use crate::store::{validate_identifier, ProfileStore};
use crate::templates::DirectoryTemplates;
use crate::utils::SystemClock;
use log::{debug, error, info, warn};
use mcp_shared::{CommandRequest, ProfileResponse, DEFAULT_PROFILE_ID};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Runs profile commands against the store, one at a time per profile
pub struct ProfileService {
    store: Arc<ProfileStore>,
    locks: Arc<Mutex<ProfileLocks>>,
}

impl ProfileService {
    pub fn new(store: ProfileStore, lock_idle: Duration) -> Self {
        Self {
            store: Arc::new(store),
            locks: Arc::new(Mutex::new(ProfileLocks::new(lock_idle))),
        }
    }

    /// Directory-backed store with templates on disk and the system clock
    pub fn from_config(config: &StoreConfig) -> Self {
        let templates = Arc::new(DirectoryTemplates::new(config.templates_dir()));
        let store = ProfileStore::new(&config.data_dir, templates, Arc::new(SystemClock));
        info!(
            "Profile store at {} (templates in {})",
            config.data_dir.display(),
            config.templates_dir().display()
        );
        Self::new(store, config.lock_idle())
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Executes `command_name` for one account.
    ///
    /// `profile_id` is the optional query parameter; absent or empty means
    /// `common_core`. The body is the raw request JSON. A body that does not
    /// parse is treated as all-default fields.
    pub async fn execute(
        &self,
        account_id: &str,
        profile_id: Option<&str>,
        command_name: &str,
        body: &[u8],
    ) -> Result<ProfileResponse> {
        let profile_id = profile_id
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROFILE_ID);
        validate_identifier("account", account_id)?;
        validate_identifier("profile", profile_id)?;

        let key = ProfileKey::new(account_id, profile_id);
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.lock_for(&key)
        };
        let _guard = lock.lock().await;

        // File I/O is synchronous, so the load/mutate/save runs off the worker threads
        let store = Arc::clone(&self.store);
        let task_key = key.clone();
        let task_command = command_name.to_string();
        let task_body = body.to_vec();
        let result = tokio::task::spawn_blocking(move || {
            run_command(&store, &task_key, &task_command, &task_body)
        })
        .await
        .map_err(McpError::from)
        .and_then(|result| result);

        if let Err(e) = &result {
            if e.is_client_error() {
                warn!("{} on {} rejected: {}", command_name, key, e);
            } else {
                error!("{} on {} failed: {}", command_name, key, e);
            }
        }
        result
    }

    /// Evicts idle profile locks now. Returns how many were dropped.
    pub async fn evict_idle_locks(&self) -> usize {
        let mut locks = self.locks.lock().await;
        locks.evict_idle().len()
    }

    pub async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Spawns a task that evicts idle profile locks every `period`
    pub fn spawn_lock_reaper(&self, period: Duration) -> JoinHandle<()> {
        let locks = Arc::clone(&self.locks);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let evicted = {
                    let mut locks_guard = locks.lock().await;
                    locks_guard.evict_idle()
                };

                if !evicted.is_empty() {
                    debug!("Lock reaper dropped {} idle entries", evicted.len());
                }
            }
        })
    }
}

// Caller holds the profile's lock
fn run_command(
    store: &ProfileStore,
    key: &ProfileKey,
    command_name: &str,
    body: &[u8],
) -> Result<ProfileResponse> {
    let mut doc = store.get_or_create(&key.account_id, &key.profile_id)?;
    let assembler = ResponseAssembler::begin(&key.profile_id, &doc, store.clock());

    let command: Command = command_name.parse()?;
    let request = parse_request(body);
    let changes = commands::execute(command, &key.profile_id, &mut doc, &request)?;

    if changes.is_empty() {
        debug!("{} on {} changed nothing", command, key);
    } else {
        doc.bump_revision()?;
        store.save(&key.account_id, &key.profile_id, &doc)?;
        info!(
            "{} on {}: {} changes, revision {} -> {}",
            command,
            key,
            changes.len(),
            assembler.base_revision(),
            doc.revision
        );
    }

    Ok(assembler.finish(&doc, changes))
}

fn parse_request(body: &[u8]) -> CommandRequest {
    match CommandRequest::from_body(body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed command body, using defaults: {}", e);
            CommandRequest::default()
        }
    }
}
