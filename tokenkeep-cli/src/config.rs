//! CLI configuration handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokenkeep_core::{AuthConfig, Secret};

/// Environment variable that overrides `client_secret` from the file.
pub const CLIENT_SECRET_ENV: &str = "TOKENKEEP_CLIENT_SECRET";

/// Location of the config file when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("tokenkeep.toml"))
}

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AuthConfig> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let mut config = read_config(&config_path)?;
    apply_env_overrides(&mut config, std::env::var(CLIENT_SECRET_ENV).ok());

    tracing::debug!(
        path = %config_path.display(),
        client_id = %config.client_id,
        client_type = %config.client_type,
        "Loaded configuration"
    );

    Ok(config)
}

fn read_config(path: &Path) -> Result<AuthConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse config from {:?}", path))
}

/// Apply overrides taken from the environment.
pub fn apply_env_overrides(config: &mut AuthConfig, client_secret: Option<String>) {
    if let Some(secret) = client_secret.filter(|s| !s.is_empty()) {
        config.client_secret = Secret::new(secret);
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tokenkeep", "tokenkeep")
}
