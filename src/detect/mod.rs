//! ISO boot-file detection.
//!
//! - [`distro`] - distribution classifier (ordered rule tables)
//! - [`locate`] - kernel / initrd glob search
//! - [`params`] - kernel command-line templates
//!
//! [`detect_tree`] works on any [`IsoTree`]; [`detect`] wraps it with a
//! read-only mount of an image file.

pub mod distro;
pub mod locate;
pub mod params;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::mount::{IsoMounter, MountedIso};
use crate::tree::IsoTree;

pub use distro::Distribution;
pub use params::BootTarget;

/// What was found inside one ISO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub distribution: Distribution,
    /// Kernel image inside the ISO, rooted at `/`.
    pub kernel_path: Option<String>,
    /// Initrd / initramfs inside the ISO, rooted at `/`.
    pub initrd_path: Option<String>,
    pub boot_parameters: String,
}

impl DetectionResult {
    /// Detection only counts as successful when a kernel was found.
    pub fn is_success(&self) -> bool {
        self.kernel_path.is_some()
    }
}

/// Classify `tree` and locate its boot files.
pub fn detect_tree(tree: &dyn IsoTree, target: &BootTarget) -> DetectionResult {
    let distribution = distro::classify(tree);
    DetectionResult {
        distribution,
        kernel_path: locate::find_kernel(tree),
        initrd_path: locate::find_initrd(tree),
        boot_parameters: params::boot_parameters(distribution, target),
    }
}

/// Mount `iso` read-only at `mount_dir`, detect, and unmount.
///
/// An error means the image could not be inspected at all; a result without
/// a kernel is returned as `Ok` and reported through
/// [`DetectionResult::is_success`].
pub fn detect(
    mounter: &dyn IsoMounter,
    iso: &Path,
    mount_dir: &Path,
    target: &BootTarget,
) -> Result<DetectionResult> {
    let mounted = MountedIso::mount(mounter, iso, mount_dir)?;
    let result = detect_tree(&mounted.tree(), target);
    if let Err(err) = mounted.unmount() {
        log::warn!("[detect] unmounting '{}' failed: {:#}", mount_dir.display(), err);
    }

    log::debug!(
        "[detect] {}: {} kernel={:?} initrd={:?}",
        iso.display(),
        result.distribution,
        result.kernel_path,
        result.initrd_path
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MemoryTree;
    use anyhow::bail;
    use std::fs;
    use tempfile::TempDir;

    fn target() -> BootTarget {
        BootTarget {
            iso_path: "/isos/test.iso".to_string(),
            label: "MULTIBOOT".to_string(),
        }
    }

    #[test]
    fn test_ubuntu_scenario() {
        let tree = MemoryTree::new()
            .file("casper/vmlinuz", "")
            .file("casper/initrd", "")
            .file(".disk/info", "Ubuntu 22.04 LTS \"Jammy Jellyfish\"");

        let result = detect_tree(&tree, &target());
        assert_eq!(result.distribution, Distribution::Ubuntu);
        assert_eq!(result.kernel_path.as_deref(), Some("/casper/vmlinuz"));
        assert_eq!(result.initrd_path.as_deref(), Some("/casper/initrd"));
        assert!(result.boot_parameters.contains("boot=casper"));
        assert!(result.is_success());
    }

    #[test]
    fn test_arch_scenario() {
        let tree = MemoryTree::new()
            .file("arch/boot/x86_64/vmlinuz-linux", "")
            .file("arch/boot/x86_64/archiso.img", "");

        let result = detect_tree(&tree, &target());
        assert_eq!(result.distribution, Distribution::Arch);
        assert_eq!(
            result.kernel_path.as_deref(),
            Some("/arch/boot/x86_64/vmlinuz-linux")
        );
        assert_eq!(
            result.initrd_path.as_deref(),
            Some("/arch/boot/x86_64/archiso.img")
        );
        assert!(result.boot_parameters.contains("img_loop="));
    }

    #[test]
    fn test_unrecognised_scenario() {
        let tree = MemoryTree::new().file("boot/vmlinuz", "");

        let result = detect_tree(&tree, &target());
        assert_eq!(result.distribution, Distribution::Unknown);
        assert_eq!(result.kernel_path.as_deref(), Some("/boot/vmlinuz"));
        assert_eq!(result.initrd_path, None);
        assert_eq!(
            result.boot_parameters,
            params::render(params::GENERIC_TEMPLATE, &target())
        );
    }

    #[test]
    fn test_missing_kernel_is_unsuccessful_not_fatal() {
        let tree = MemoryTree::new()
            .file(".disk/info", "Linux Mint 21")
            .file("casper/initrd.lz", "");

        let result = detect_tree(&tree, &target());
        assert!(!result.is_success());
        assert_eq!(result.distribution, Distribution::Mint);
        assert_eq!(result.initrd_path.as_deref(), Some("/casper/initrd.lz"));
    }

    struct FailingMounter;

    impl IsoMounter for FailingMounter {
        fn mount(&self, iso: &Path, _target: &Path) -> Result<()> {
            bail!("wrong fs type, bad option, bad superblock on {}", iso.display())
        }

        fn unmount(&self, _target: &Path) -> Result<()> {
            panic!("nothing was mounted")
        }
    }

    /// Pretends the scratch directory already holds the ISO contents.
    struct PrepopulatedMounter;

    impl IsoMounter for PrepopulatedMounter {
        fn mount(&self, _iso: &Path, _target: &Path) -> Result<()> {
            Ok(())
        }

        fn unmount(&self, _target: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_mount_failure_yields_error_without_partial_result() {
        let temp = TempDir::new().unwrap();
        let iso = temp.path().join("corrupt.iso");
        fs::write(&iso, b"not an iso").unwrap();

        let result = detect(&FailingMounter, &iso, &temp.path().join("mnt"), &target());
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("bad superblock"));
    }

    #[test]
    fn test_detect_reads_mounted_directory() {
        let temp = TempDir::new().unwrap();
        let iso = temp.path().join("debian-live.iso");
        fs::write(&iso, b"").unwrap();
        let mnt = temp.path().join("mnt");
        fs::create_dir_all(mnt.join("live")).unwrap();
        fs::write(mnt.join("live/vmlinuz-6.1.0-9-amd64"), b"").unwrap();
        fs::write(mnt.join("live/initrd.img-6.1.0-9-amd64"), b"").unwrap();

        let result = detect(&PrepopulatedMounter, &iso, &mnt, &target()).unwrap();
        assert_eq!(result.distribution, Distribution::DebianLive);
        assert_eq!(
            result.kernel_path.as_deref(),
            Some("/live/vmlinuz-6.1.0-9-amd64")
        );
        assert_eq!(
            result.initrd_path.as_deref(),
            Some("/live/initrd.img-6.1.0-9-amd64")
        );
        assert!(result.boot_parameters.contains("boot=live"));
    }

    #[test]
    fn test_result_serializes_with_tags() {
        let tree = MemoryTree::new().file("live/vmlinuz", "");
        let json = serde_json::to_value(detect_tree(&tree, &target())).unwrap();
        assert_eq!(json["distribution"], "debian-live");
        assert_eq!(json["kernel_path"], "/live/vmlinuz");
        assert!(json["initrd_path"].is_null());
    }
}
