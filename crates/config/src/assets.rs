use std::path::PathBuf;

use directories::ProjectDirs;

pub const ASSET_DIR_ENV: &str = "TASKDESK_ASSET_DIR";

/// Directory holding `config.json` and `session.json`, created on first use.
pub fn asset_dir() -> std::io::Result<PathBuf> {
    let path = match std::env::var(ASSET_DIR_ENV) {
        Ok(override_dir) if !override_dir.trim().is_empty() => {
            PathBuf::from(override_dir.trim())
        }
        _ => ProjectDirs::from("dev", "taskdesk", "taskdesk")
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "OS didn't give us a home directory",
                )
            })?
            .data_dir()
            .to_path_buf(),
    };

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }

    Ok(path)
    // Linux → ~/.local/share/taskdesk
    // macOS → ~/Library/Application Support/dev.taskdesk.taskdesk
}

pub fn config_path() -> std::io::Result<PathBuf> {
    Ok(asset_dir()?.join("config.json"))
}

pub fn session_path() -> std::io::Result<PathBuf> {
    Ok(asset_dir()?.join("session.json"))
}
