//! Writing generated entries into a live `grub.cfg`.
//!
//! The file is backed up with a plain copy before it is touched. Writes are
//! not atomic; if one is interrupted, the backup is how to recover.

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

use super::{base_config, TargetLayout};
use crate::blkid;
use crate::detect::params::{DATA_UUID_PLACEHOLDER, EFI_UUID_PLACEHOLDER};

/// Filesystem UUIDs substituted into the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionUuids {
    pub data: String,
    pub efi: Option<String>,
}

/// Path of the backup written next to `cfg` at `now`.
pub fn backup_path(cfg: &Path, now: OffsetDateTime) -> Result<PathBuf> {
    let stamp = now
        .format(format_description!(
            "[year][month][day]T[hour][minute][second]"
        ))
        .context("formatting backup timestamp")?;
    let name = cfg
        .file_name()
        .with_context(|| format!("'{}' has no file name", cfg.display()))?
        .to_string_lossy();
    Ok(cfg.with_file_name(format!("{name}.bak-{stamp}")))
}

fn backup(cfg: &Path) -> Result<PathBuf> {
    let stamped = backup_path(cfg, OffsetDateTime::now_utc())?;
    // Never overwrite an earlier backup taken within the same second.
    let mut backup = stamped.clone();
    let mut n = 1;
    while backup.exists() {
        backup = PathBuf::from(format!("{}.{}", stamped.display(), n));
        n += 1;
    }
    fs::copy(cfg, &backup).with_context(|| {
        format!(
            "backing up '{}' to '{}'",
            cfg.display(),
            backup.display()
        )
    })?;
    log::info!("[grub] backup written to {}", backup.display());
    Ok(backup)
}

/// Append `fragment` to `cfg`.
///
/// An existing file is backed up first and the backup path is returned. A
/// missing file is created from [`base_config`] and `None` is returned.
pub fn install_fragment(cfg: &Path, fragment: &str, layout: &TargetLayout) -> Result<Option<PathBuf>> {
    if !cfg.exists() {
        if let Some(parent) = cfg.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating '{}'", parent.display()))?;
        }
        let mut contents = base_config(layout);
        contents.push_str(fragment);
        fs::write(cfg, contents).with_context(|| format!("writing '{}'", cfg.display()))?;
        log::info!("[grub] created {}", cfg.display());
        return Ok(None);
    }

    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .open(cfg)
        .with_context(|| format!("opening '{}'", cfg.display()))?;
    file.try_lock_exclusive()
        .with_context(|| format!("'{}' is locked by another process", cfg.display()))?;

    let backup = backup(cfg)?;

    let mut existing = String::new();
    file.read_to_string(&mut existing)
        .with_context(|| format!("reading '{}'", cfg.display()))?;
    let mut addition = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        addition.push('\n');
    }
    addition.push('\n');
    addition.push_str(fragment);

    file.write_all(addition.as_bytes())
        .with_context(|| format!("appending to '{}'", cfg.display()))?;
    file.sync_all()
        .with_context(|| format!("syncing '{}'", cfg.display()))?;
    FileExt::unlock(&file).with_context(|| format!("unlocking '{}'", cfg.display()))?;

    log::info!("[grub] appended {} bytes to {}", addition.len(), cfg.display());
    Ok(Some(backup))
}

/// Replace UUID placeholders in `text`.
///
/// The EFI placeholder is left alone when no EFI UUID is given.
pub fn substitute_placeholders(text: &str, uuids: &PartitionUuids) -> String {
    let text = text.replace(DATA_UUID_PLACEHOLDER, &uuids.data);
    match &uuids.efi {
        Some(efi) => text.replace(EFI_UUID_PLACEHOLDER, efi),
        None => text,
    }
}

/// Rewrite `cfg` in place with the given UUIDs; returns the backup path.
pub fn apply_uuids(cfg: &Path, uuids: &PartitionUuids) -> Result<PathBuf> {
    if uuids.data.is_empty() {
        bail!("refusing to substitute an empty data partition UUID into '{}'", cfg.display());
    }
    if uuids.efi.as_deref() == Some("") {
        bail!("refusing to substitute an empty EFI partition UUID into '{}'", cfg.display());
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(cfg)
        .with_context(|| format!("opening '{}'", cfg.display()))?;
    file.try_lock_exclusive()
        .with_context(|| format!("'{}' is locked by another process", cfg.display()))?;

    let backup = backup(cfg)?;

    let mut text = String::new();
    file.read_to_string(&mut text)
        .with_context(|| format!("reading '{}'", cfg.display()))?;
    if !text.contains(DATA_UUID_PLACEHOLDER) {
        log::warn!("[grub] '{}' has no {} placeholder", cfg.display(), DATA_UUID_PLACEHOLDER);
    }
    let replaced = substitute_placeholders(&text, uuids);

    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.set_len(0))
        .with_context(|| format!("truncating '{}'", cfg.display()))?;
    file.write_all(replaced.as_bytes())
        .with_context(|| format!("rewriting '{}'", cfg.display()))?;
    file.sync_all()
        .with_context(|| format!("syncing '{}'", cfg.display()))?;
    FileExt::unlock(&file).with_context(|| format!("unlocking '{}'", cfg.display()))?;
    Ok(backup)
}

/// Query blkid for the partitions and rewrite `cfg` with their UUIDs.
pub fn apply_partition_uuids(cfg: &Path, data_device: &Path, efi_device: Option<&Path>) -> Result<PathBuf> {
    let data = blkid::query_uuid(data_device)?;
    let efi = efi_device.map(blkid::query_uuid).transpose()?;
    log::info!(
        "[grub] data partition {} has UUID '{}'",
        data_device.display(),
        data
    );
    apply_uuids(cfg, &PartitionUuids { data, efi })
}
