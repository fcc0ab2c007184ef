//! Configuration manager for the portal.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_STORAGE_PATH: &str = "portal-store.json";
const DEFAULT_NAME: &str = "Smiya City Roleplay";
const DEFAULT_MAIL_DOMAIN: &str = "gmail.com";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name shown by the presentation layer.
    pub name: String,
    /// Backing file for the local record store.
    pub storage: PathBuf,
    /// Mail domain registrations are restricted to, matched as a lowercase
    /// substring of the submitted address.
    pub mail_domain: String,
    /// Cosmetic delay applied before the register and login flows complete,
    /// standing in for the network round-trip the original site faked.
    pub simulated_latency_ms: u64,
    version: String,
    #[serde(skip)]
    path: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            storage: DEFAULT_STORAGE_PATH.into(),
            mail_domain: DEFAULT_MAIL_DOMAIN.to_owned(),
            simulated_latency_ms: 0,
            version: String::default(),
            path: PathBuf::default(),
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, falling back to defaults when it is missing or malformed.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration = match serde_yaml::from_reader(file) {
                    Ok(config) => config,
                    Err(err) => {
                        return Arc::new(self.error(err));
                    },
                };

                // set app version.
                config.version = VERSION.to_owned();
                // mail domain is compared lowercased.
                config.mail_domain = config.mail_domain.to_lowercase();

                Arc::new(config)
            },
            Err(err) => Arc::new(self.error(err)),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
