//! Writing a composed project to disk

use crate::composer::FileSet;
use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

const STAGED_DIR: &str = "files";
const BACKUP_DIR: &str = "replaced";

/// Write every file of `files` under `target_dir`.
///
/// Files are first written to a hidden staging directory next to the target
/// and then renamed into place. If a rename fails, files already moved are
/// taken out again and any file they replaced is restored, so the target's
/// files end up as they were before the call. Directories created on the way
/// may remain. The staging directory is removed in every case. Returns the
/// written paths relative to `target_dir`.
pub async fn write_file_set(files: &FileSet, target_dir: &Path) -> Result<Vec<String>> {
    for path in files.keys() {
        if !is_safe_relative(path) {
            anyhow::bail!("Refusing to write outside the project directory: {}", path);
        }
    }

    let staging = staging_dir(target_dir);
    let result = stage_and_commit(files, &staging, target_dir).await;
    if fs::try_exists(&staging).await.unwrap_or(false) {
        if let Err(e) = fs::remove_dir_all(&staging).await {
            debug!(path = %staging.display(), error = %e, "failed to remove staging directory");
        }
    }
    result
}

async fn stage_and_commit(files: &FileSet, staging: &Path, target_dir: &Path) -> Result<Vec<String>> {
    let staged_root = staging.join(STAGED_DIR);
    fs::create_dir_all(&staged_root)
        .await
        .with_context(|| format!("Failed to create staging directory: {}", staging.display()))?;

    for (path, content) in files {
        let staged = staged_root.join(path);
        create_parent(&staged).await?;
        fs::write(&staged, content)
            .await
            .with_context(|| format!("Failed to write file: {}", staged.display()))?;
    }

    fs::create_dir_all(target_dir)
        .await
        .context("Failed to create target directory")?;

    let backup_root = staging.join(BACKUP_DIR);
    let mut committed = Vec::with_capacity(files.len());
    for path in files.keys() {
        match commit(path, &staged_root, &backup_root, target_dir).await {
            Ok(moved) => committed.push(moved),
            Err(e) => {
                rollback(committed).await;
                return Err(e);
            }
        }
    }

    debug!(files = committed.len(), dir = %target_dir.display(), "project written");
    Ok(files.keys().cloned().collect())
}

/// A file moved into the target, with the backup of the file it replaced
struct Committed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

async fn commit(path: &str, staged_root: &Path, backup_root: &Path, target_dir: &Path) -> Result<Committed> {
    let target = target_dir.join(path);
    create_parent(&target).await?;

    let backup = match fs::symlink_metadata(&target).await {
        Ok(meta) if !meta.is_dir() => {
            let backup = backup_root.join(path);
            create_parent(&backup).await?;
            fs::rename(&target, &backup)
                .await
                .with_context(|| format!("Failed to set aside existing file: {}", target.display()))?;
            Some(backup)
        }
        _ => None,
    };

    if let Err(e) = fs::rename(staged_root.join(path), &target).await {
        if let Some(backup) = &backup {
            let _ = fs::rename(backup, &target).await;
        }
        return Err(e).with_context(|| format!("Failed to move file into place: {}", target.display()));
    }
    Ok(Committed { target, backup })
}

async fn rollback(committed: Vec<Committed>) {
    for moved in committed.into_iter().rev() {
        let restored = match &moved.backup {
            Some(backup) => fs::rename(backup, &moved.target).await,
            None => fs::remove_file(&moved.target).await,
        };
        if let Err(e) = restored {
            debug!(path = %moved.target.display(), error = %e, "failed to roll back file");
        }
    }
}

async fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Hidden sibling of the target, on the same filesystem so renames are cheap
fn staging_dir(target_dir: &Path) -> PathBuf {
    let parent = match target_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = target_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    parent.join(format!(".{}.stackup-{}", name, std::process::id()))
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
