use std::{
    env,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;

const FACTORY_HOME_ENV: &str = "SKYBEAM_HOME";
const CONFIG_ENV: &str = "SKYBEAM_CONFIG";

/// Well-known directory names inside the factory root.
///
/// ```text
/// <root>/
/// ├── config.toml
/// ├── trends/  research/  competitors/  scripts/  reviews/
/// ├── asset_briefs/  asset_qa/
/// ├── production/{renders,qa,masters}/
/// ├── publish/{packages,receipts/<platform>}/
/// ├── metrics/
/// ├── credentials/<platform>.json
/// ├── state/                 # append-only bookkeeping
/// ├── events/<topic>.jsonl   # event spool
/// └── locks/                 # advisory stage locks
/// ```
pub mod factory_structure {
    pub const CONFIG_FILE: &str = "config.toml";
    pub const CREDENTIALS_DIR: &str = "credentials";
    pub const STATE_DIR: &str = "state";
    pub const EVENTS_DIR: &str = "events";
    pub const LOCKS_DIR: &str = "locks";
    pub const MASTERS_DIR: &str = "production/masters";
    pub const PRODUCTION_LOCK: &str = "production.lock";
    pub const PUBLISH_LOCK: &str = "publish.lock";
}

/// Resolve the factory root.
///
/// Order: explicit override, `SKYBEAM_HOME`, then the platform data dir
/// (`~/.local/share/skybeam` on Linux).
pub fn factory_dir(explicit: Option<&Path>) -> std::io::Result<PathBuf> {
    let path = if let Some(path) = explicit {
        path.to_path_buf()
    } else if let Ok(custom_dir) = env::var(FACTORY_HOME_ENV) {
        PathBuf::from(custom_dir)
    } else {
        ProjectDirs::from("ai", "skybeam", "skybeam")
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no home directory available for the factory root",
                )
            })?
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
        tracing::info!("Created factory root: {}", path.display());
    }

    Ok(path)
}

/// Config file path: explicit override, `SKYBEAM_CONFIG`, else `<root>/config.toml`.
pub fn config_path(root: &Path, explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    root.join(factory_structure::CONFIG_FILE)
}

pub fn locks_dir(root: &Path) -> PathBuf {
    root.join(factory_structure::LOCKS_DIR)
}

pub fn production_lock_path(root: &Path) -> PathBuf {
    locks_dir(root).join(factory_structure::PRODUCTION_LOCK)
}

pub fn publish_lock_path(root: &Path) -> PathBuf {
    locks_dir(root).join(factory_structure::PUBLISH_LOCK)
}

pub fn credentials_dir(root: &Path) -> PathBuf {
    root.join(factory_structure::CREDENTIALS_DIR)
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(factory_structure::STATE_DIR)
}

pub fn events_dir(root: &Path) -> PathBuf {
    root.join(factory_structure::EVENTS_DIR)
}

pub fn masters_dir(root: &Path) -> PathBuf {
    root.join(factory_structure::MASTERS_DIR)
}
