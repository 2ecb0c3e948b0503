//! Content tooling for multi-ISO bootable USB drives.
//!
//! Given a directory of Linux ISO images, this crate works out how each one
//! boots and writes GRUB2 `menuentry` blocks that loopback-mount the image
//! straight from the drive's data partition:
//!
//! - **Detection** - classify the distribution and find kernel/initrd paths
//!   inside a read-only mounted ISO ([`detect`])
//! - **Rendering** - turn a detection into a GRUB entry ([`grub`])
//! - **Installation** - back up and extend a live `grub.cfg`, resolve
//!   partition UUIDs through blkid ([`grub::install`], [`blkid`])
//! - **Batch** - run the above over a directory, one ISO at a time ([`scan`])
//! - **Copying** - put the images onto the drive ([`copy`])
//!
//! Partitioning, formatting and `grub-install` are left to the usual system
//! tools.
//!
//! # Architecture
//!
//! ```text
//! scan ──► mount::IsoMounter ──► tree::DirTree ─┐
//!   │                                           ▼
//!   │                     detect::{distro, locate, params}
//!   │                                           │
//!   └──────────────► grub (menuentry text) ◄────┘
//!                         │
//!                         ▼
//!                 grub::install ──► blkid
//! ```
//!
//! # Example
//!
//! ```rust
//! use multiboot_usb::detect::{detect_tree, Distribution};
//! use multiboot_usb::grub::{render_menu_entry, TargetLayout};
//! use multiboot_usb::tree::MemoryTree;
//!
//! let iso = MemoryTree::new()
//!     .file(".disk/info", "Ubuntu 22.04 LTS \"Jammy Jellyfish\"")
//!     .file("casper/vmlinuz", "")
//!     .file("casper/initrd", "");
//!
//! let layout = TargetLayout::default();
//! let result = detect_tree(&iso, &layout.boot_target("ubuntu.iso"));
//! assert_eq!(result.distribution, Distribution::Ubuntu);
//!
//! let entry = render_menu_entry(&result, "ubuntu.iso", &layout);
//! assert!(entry.contains("linux (loop)/casper/vmlinuz boot=casper"));
//! ```

pub mod blkid;
pub mod config;
pub mod copy;
pub mod detect;
pub mod glob;
pub mod grub;
pub mod mount;
pub mod preflight;
pub mod process;
pub mod scan;
pub mod tree;

pub use config::Settings;
pub use detect::{detect, detect_tree, DetectionResult, Distribution};
pub use grub::{render_generic_entry, render_menu_entry, TargetLayout};
pub use mount::{IsoMounter, LoopMounter};
