use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Storage settings for the profile service.
///
/// Derives `clap::Args` so the binary hosting the HTTP routes can flatten it
/// into its own command line.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory holding per-account profile documents
    #[arg(long = "profile-data-dir", default_value = "config")]
    pub data_dir: PathBuf,

    /// Directory of template documents (defaults to <data-dir>/templates)
    #[arg(long = "profile-templates-dir")]
    pub templates_dir: Option<PathBuf>,

    /// Seconds an unused profile lock stays in the lock table
    #[arg(long = "lock-idle-secs", default_value = "300")]
    pub lock_idle_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("config"),
            templates_dir: None,
            lock_idle_secs: 300,
        }
    }
}

impl StoreConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.templates_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("templates"))
    }

    pub fn lock_idle(&self) -> Duration {
        Duration::from_secs(self.lock_idle_secs)
    }
}
