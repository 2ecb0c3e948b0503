//! Kernel and initrd discovery.
//!
//! Both searches expand every pattern of their list, pool the matches, drop
//! directories and anything under GRUB's module directory or with a
//! non-bootable extension, then pick the lexicographically first survivor.

use crate::glob::{expand, Pattern};
use crate::tree::IsoTree;

/// Kernel image patterns, distribution-specific first.
pub const KERNEL_PATTERNS: &[&str] = &[
    "casper/vmlinuz*",
    "live/vmlinuz*",
    "arch/boot/x86_64/vmlinuz*",
    "arch/boot/vmlinuz*",
    "boot/x86_64/loader/linux",
    "images/pxeboot/vmlinuz*",
    "isolinux/vmlinuz*",
    "install.amd/vmlinuz*",
    "install/vmlinuz*",
    "boot/vmlinuz*",
    "boot/*/vmlinuz*",
    "boot/linux*",
    "vmlinuz*",
    "linux*",
];

/// Initrd / initramfs patterns, distribution-specific first.
pub const INITRD_PATTERNS: &[&str] = &[
    "casper/initrd*",
    "live/initrd*",
    "arch/boot/x86_64/archiso.img",
    "arch/boot/x86_64/initramfs*",
    "arch/boot/archiso.img",
    "boot/x86_64/loader/initrd",
    "images/pxeboot/initrd*",
    "isolinux/initrd*",
    "install.amd/initrd*",
    "install/initrd*",
    "boot/initrd*",
    "boot/initramfs*",
    "boot/*/initrd*",
    "boot/*/initramfs*",
    "initrd*",
    "initramfs*",
];

/// GRUB's own module tree; its `linux.mod` and friends are never kernels.
pub const BOOTLOADER_MODULE_DIR: &str = "/boot/grub/";

const KERNEL_REJECTED_EXTENSIONS: &[&str] = &[".mod", ".img"];
const INITRD_REJECTED_EXTENSIONS: &[&str] = &[".mod"];

/// Which list a search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootFile {
    Kernel,
    Initrd,
}

impl BootFile {
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            BootFile::Kernel => KERNEL_PATTERNS,
            BootFile::Initrd => INITRD_PATTERNS,
        }
    }

    fn rejected_extensions(self) -> &'static [&'static str] {
        match self {
            BootFile::Kernel => KERNEL_REJECTED_EXTENSIONS,
            BootFile::Initrd => INITRD_REJECTED_EXTENSIONS,
        }
    }

    /// Whether a matched path is acceptable as this kind of boot file.
    pub fn accepts(self, path: &str) -> bool {
        if path.starts_with(BOOTLOADER_MODULE_DIR) {
            return false;
        }
        let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
        !self
            .rejected_extensions()
            .iter()
            .any(|ext| name.ends_with(ext))
    }
}

/// All acceptable candidates for `kind`, deduplicated and sorted.
///
/// Only regular files qualify; a directory such as `/linux-firmware` never
/// stands in for a kernel.
pub fn candidates(tree: &dyn IsoTree, kind: BootFile) -> Vec<String> {
    let mut found: Vec<String> = kind
        .patterns()
        .iter()
        .flat_map(|pattern| expand(tree, &Pattern::new(pattern)))
        .filter(|path| kind.accepts(path) && tree.is_file(path))
        .collect();
    found.sort();
    found.dedup();
    found
}

/// Best candidate for `kind`, if any.
pub fn locate(tree: &dyn IsoTree, kind: BootFile) -> Option<String> {
    candidates(tree, kind).into_iter().next()
}

pub fn find_kernel(tree: &dyn IsoTree) -> Option<String> {
    locate(tree, BootFile::Kernel)
}

pub fn find_initrd(tree: &dyn IsoTree) -> Option<String> {
    locate(tree, BootFile::Initrd)
}
