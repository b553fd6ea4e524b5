use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "VIBE_ASSET_DIR";

/// Directory holding the SQLite file. `VIBE_ASSET_DIR` wins; debug builds use
/// `dev_assets/` at the workspace root, release builds the platform data dir.
pub fn asset_dir() -> std::io::Result<PathBuf> {
    let path = match std::env::var(ASSET_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
        _ if cfg!(debug_assertions) => PathBuf::from(PROJECT_ROOT).join("../../dev_assets"),
        _ => ProjectDirs::from("dev", "vibeweb", "vibeweb-os")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "OS didn't give us a home directory",
                )
            })?,
    };

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }

    Ok(path)
}

pub fn database_path() -> std::io::Result<PathBuf> {
    Ok(asset_dir()?.join("vibeweb.sqlite"))
}
