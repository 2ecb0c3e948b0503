//! Batch detection over a directory of ISO images.
//!
//! ISOs are processed strictly one after another through the single scratch
//! mount directory. A failure only affects the ISO it happened on; the batch
//! always produces an entry for every image.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::detect::{detect, DetectionResult};
use crate::grub::{render_generic_entry, render_menu_entry};
use crate::mount::IsoMounter;

/// How processing of one ISO ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    Detected,
    /// Mounted and classified, but no kernel matched.
    NoKernel,
    /// The image could not be mounted; a generic entry was emitted.
    MountFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct IsoReport {
    pub iso: PathBuf,
    pub file_name: String,
    pub outcome: Outcome,
    pub detection: Option<DetectionResult>,
}

impl IsoReport {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Detected
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub isos: Vec<IsoReport>,
    /// Concatenated `menuentry` blocks, ready to append to `grub.cfg`.
    pub fragment: String,
}

impl ScanReport {
    pub fn failures(&self) -> usize {
        self.isos.iter().filter(|iso| !iso.is_success()).count()
    }
}

fn has_iso_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("iso"))
}

/// List `.iso` files under `dir`, sorted by file name.
///
/// Images land flat in one directory on the drive, so a name seen twice in a
/// recursive listing is skipped after its first occurrence. An unreadable
/// entry or symlink loop below `dir` is logged and skipped; only an
/// unreadable `dir` itself is an error.
pub fn find_isos(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut seen = BTreeSet::new();
    let mut isos = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(err)
                    .with_context(|| format!("listing ISO directory '{}'", dir.display()));
            }
            Err(err) => {
                log::warn!("[scan] skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_iso_extension(entry.path()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !seen.insert(name.clone()) {
            log::warn!(
                "[scan] skipping '{}': another ISO named '{}' was already found",
                entry.path().display(),
                name
            );
            continue;
        }
        isos.push(entry.into_path());
    }

    isos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(isos)
}

/// Detect one ISO and render its entry.
pub fn process_iso(mounter: &dyn IsoMounter, iso: &Path, settings: &Settings) -> (IsoReport, String) {
    let file_name = iso
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| iso.display().to_string());
    if file_name.chars().any(char::is_whitespace) {
        log::warn!(
            "[scan:{}] file name contains whitespace; kernel parameters will break",
            file_name
        );
    }

    let layout = &settings.layout;
    let target = layout.boot_target(&file_name);

    match detect(mounter, iso, &settings.mount_dir, &target) {
        Ok(result) => {
            let outcome = if result.is_success() {
                log::info!(
                    "[scan:{}] {} kernel={}",
                    file_name,
                    result.distribution,
                    result.kernel_path.as_deref().unwrap_or("-")
                );
                Outcome::Detected
            } else {
                log::warn!(
                    "[scan:{}] {}: no kernel found; entry needs manual fix-up",
                    file_name,
                    result.distribution
                );
                Outcome::NoKernel
            };
            if result.initrd_path.is_none() {
                log::warn!("[scan:{}] no initrd found", file_name);
            }
            let text = render_menu_entry(&result, &file_name, layout);
            let report = IsoReport {
                iso: iso.to_path_buf(),
                file_name,
                outcome,
                detection: Some(result),
            };
            (report, text)
        }
        Err(err) => {
            log::error!("[scan:{}] could not inspect ISO: {:#}", file_name, err);
            let text = render_generic_entry(&file_name, layout);
            let report = IsoReport {
                iso: iso.to_path_buf(),
                file_name,
                outcome: Outcome::MountFailed {
                    reason: format!("{err:#}"),
                },
                detection: None,
            };
            (report, text)
        }
    }
}

/// Detect every ISO in `isos`, in order.
pub fn scan_paths(mounter: &dyn IsoMounter, isos: &[PathBuf], settings: &Settings) -> ScanReport {
    let mut reports = Vec::with_capacity(isos.len());
    let mut entries = Vec::with_capacity(isos.len());

    for iso in isos {
        let (report, text) = process_iso(mounter, iso, settings);
        reports.push(report);
        entries.push(text);
    }

    ScanReport {
        isos: reports,
        fragment: entries.join("\n"),
    }
}

/// Detect every ISO in the configured directory.
pub fn scan_isos(mounter: &dyn IsoMounter, settings: &Settings) -> Result<ScanReport> {
    let isos = find_isos(&settings.iso_dir, settings.recursive)?;
    if isos.is_empty() {
        log::warn!("[scan] no .iso files in '{}'", settings.iso_dir.display());
    }
    let report = scan_paths(mounter, &isos, settings);
    log::info!(
        "[scan] {} ISO(s), {} need attention",
        report.isos.len(),
        report.failures()
    );
    Ok(report)
}
