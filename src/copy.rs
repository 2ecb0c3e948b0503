//! Copying ISO images onto the drive's data partition.
//!
//! `rsync` is preferred so an interrupted copy can be resumed in place;
//! plain `cp` is the fallback when rsync is not installed.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Tool used to copy files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Copier {
    Rsync,
    Cp,
}

impl Copier {
    pub fn detect() -> Self {
        if which::which("rsync").is_ok() {
            Copier::Rsync
        } else {
            Copier::Cp
        }
    }

    fn command(self, src: &Path, dest: &Path) -> Cmd {
        match self {
            Copier::Rsync => Cmd::new("rsync")
                .args(["--inplace", "--times", "--partial"])
                .arg_path(src)
                .arg_path(dest),
            Copier::Cp => Cmd::new("cp")
                .arg("--preserve=timestamps")
                .arg_path(src)
                .arg_path(dest),
        }
    }
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).with_context(|| format!("hashing '{}'", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Copy one file into `dest_dir` and optionally verify it.
pub fn copy_iso(copier: Copier, src: &Path, dest_dir: &Path, verify: bool) -> Result<PathBuf> {
    let name = src
        .file_name()
        .with_context(|| format!("'{}' has no file name", src.display()))?;
    let dest = dest_dir.join(name);

    copier
        .command(src, &dest)
        .error_msg(format!(
            "copying '{}' to '{}' failed",
            src.display(),
            dest.display()
        ))
        .run()?;

    if verify {
        let expected = sha256_file(src)?;
        let actual = sha256_file(&dest)?;
        if expected != actual {
            bail!(
                "checksum mismatch for '{}': source {} copy {}",
                dest.display(),
                expected,
                actual
            );
        }
        log::debug!("[copy] {} sha256 {}", dest.display(), actual);
    }

    Ok(dest)
}

/// Copy `isos` into `dest_dir`, one at a time.
pub fn copy_isos(isos: &[PathBuf], dest_dir: &Path, verify: bool) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating '{}'", dest_dir.display()))?;

    let copier = Copier::detect();
    log::info!("[copy] using {:?}", copier);

    let mut copied = Vec::with_capacity(isos.len());
    for (index, iso) in isos.iter().enumerate() {
        log::info!(
            "[copy {}/{}] {}",
            index + 1,
            isos.len(),
            iso.display()
        );
        copied.push(copy_iso(copier, iso, dest_dir, verify)?);
    }
    Ok(copied)
}
