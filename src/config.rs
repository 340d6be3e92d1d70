//! Where the client gets its data from.
//!
//! With an API URL the client talks to the remote service over HTTP.
//! Without one it serves a local JSON store, by default
//! `~/.taskboard/store.json`, acting as a named local user.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::error::ConfigError;
use crate::http::HttpTaskService;
use crate::memory::InMemoryTaskService;
use crate::service::TaskService;

pub const DATA_DIR_NAME: &str = ".taskboard";
pub const STORE_FILE_NAME: &str = "store.json";
pub const LOG_FILE_NAME: &str = "taskboard.log";
pub const DEFAULT_USER: &str = "me";

/// Which [`TaskService`] implementation to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Local { store_path: PathBuf, user: String },
    Remote { api_url: String, token: Option<String> },
}

/// Raw options as collected from flags and environment.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub store: Option<PathBuf>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: Backend,
    /// Directory for the local store and the TUI log file.
    pub data_dir: PathBuf,
}

impl Settings {
    /// Resolve options against `$HOME`.
    pub fn resolve(options: Options) -> Result<Self, ConfigError> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self::resolve_with_home(options, home.as_deref())
    }

    pub fn resolve_with_home(options: Options, home: Option<&Path>) -> Result<Self, ConfigError> {
        let data_dir = match options.store.as_deref() {
            Some(store) => store.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new(".")).to_path_buf(),
            None => home.ok_or(ConfigError::NoDataDir)?.join(DATA_DIR_NAME),
        };

        let backend = match options.api_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let url = url.trim().to_string();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidApiUrl(url));
                }
                Backend::Remote { api_url: url, token: options.token.filter(|t| !t.is_empty()) }
            }
            None => Backend::Local {
                store_path: options.store.unwrap_or_else(|| data_dir.join(STORE_FILE_NAME)),
                user: options.user.filter(|u| !u.trim().is_empty()).unwrap_or_else(|| DEFAULT_USER.to_string()),
            },
        };

        debug!(?backend, data_dir = %data_dir.display(), "resolved settings");
        Ok(Settings { backend, data_dir })
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }

    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::CreateDir {
            path: self.data_dir.display().to_string(),
            source,
        })
    }

    /// Build the configured service.
    pub fn connect(&self) -> anyhow::Result<Rc<dyn TaskService>> {
        match &self.backend {
            Backend::Remote { api_url, token } => {
                let service = HttpTaskService::new(api_url.clone());
                let service = match token {
                    Some(token) => service.with_token(token.clone()),
                    None => service,
                };
                Ok(Rc::new(service))
            }
            Backend::Local { store_path, user } => {
                self.ensure_data_dir()?;
                Ok(Rc::new(InMemoryTaskService::open(store_path, user)?))
            }
        }
    }

    /// Short human-readable description of the backend.
    pub fn describe(&self) -> String {
        match &self.backend {
            Backend::Remote { api_url, .. } => api_url.clone(),
            Backend::Local { store_path, user } => format!("{} (as {user})", store_path.display()),
        }
    }
}
