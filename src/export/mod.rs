pub mod filename;

pub use filename::{export_filename, sanitize_filename};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;

/// Write the publish artifact next to the user's other exports and return
/// its path. The body is only written once fully received, so a failed
/// publish never leaves a partial file behind.
pub fn save_export(
    bytes: &[u8],
    dir: &Path,
    original_filename: &str,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    }

    let path = dir.join(export_filename(original_filename, now));
    fs::write(&path, bytes)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;

    info!("exported {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}
