use crate::{AppConfig, ConfdiffError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "confdiff.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub exists: bool,
    pub portable: bool,
}

/// Load `confdiff.toml` from beside the executable if present, else from the
/// platform config directory.
pub fn load_config() -> Result<LoadedConfig, ConfdiffError> {
    let (path, portable) = resolve_config_path()?;
    let mut loaded = load_config_from(&path)?;
    loaded.portable = portable;
    Ok(loaded)
}

/// Load a config file from an explicit location; a missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<LoadedConfig, ConfdiffError> {
    let exists = path.exists();

    let config = if exists {
        let data = fs::read_to_string(path)?;
        toml::from_str(&data).map_err(|e| ConfdiffError::Serialization(e.to_string()))?
    } else {
        AppConfig::default()
    };

    Ok(LoadedConfig {
        config,
        path: path.to_path_buf(),
        exists,
        portable: false,
    })
}

fn resolve_config_path() -> Result<(PathBuf, bool), ConfdiffError> {
    if let Some(portable_path) = portable_config_path() {
        if portable_path.exists() {
            return Ok((portable_path, true));
        }
    }

    let dirs = ProjectDirs::from("", "confdiff", "confdiff")
        .ok_or_else(|| ConfdiffError::Config("Unable to determine config directory".to_string()))?;
    Ok((dirs.config_dir().join(CONFIG_FILE_NAME), false))
}

fn portable_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
}
