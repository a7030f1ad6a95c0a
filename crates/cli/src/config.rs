use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};
use tallygate_common::config::AppConfig;

/// Config file picked up from the working directory when nothing else names one.
pub const DEFAULT_CONFIG_FILE: &str = "tallygate.yaml";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TALLYGATE_CONFIG";

/// Which config file to read.
///
/// Priority: `--config` > `TALLYGATE_CONFIG` > `./tallygate.yaml` > none (defaults plus
/// `TALLYGATE_*` overrides).
pub fn resolve_path(arg: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = arg {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let local = Path::new(DEFAULT_CONFIG_FILE);
    local.exists().then(|| local.to_path_buf())
}

pub fn load(arg: Option<&str>) -> Result<(AppConfig, Option<PathBuf>)> {
    let path = resolve_path(arg);
    let config = AppConfig::load(path.as_deref().and_then(Path::to_str))?;
    Ok((config, path))
}
