use anyhow::Context;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncSeekExt;

/// Creates (or truncates) `path` and sets its length to `total_size`, so
/// every worker can write its region in place.
pub async fn preallocate(path: &Path, total_size: u64) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create_dir_all {}", parent.display()))?;
    }

    let file = File::create(path)
        .await
        .with_context(|| format!("create {}", path.display()))?;
    file.set_len(total_size)
        .await
        .with_context(|| format!("set_len {} on {}", total_size, path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("sync {}", path.display()))?;
    Ok(())
}

/// Opens a separate write handle on an already preallocated file,
/// positioned at `offset`.
pub async fn open_at(path: &Path, offset: u64) -> anyhow::Result<File> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("open {}", path.display()))?;
    file.seek(SeekFrom::Start(offset))
        .await
        .with_context(|| format!("seek {} to {}", path.display(), offset))?;
    Ok(file)
}
