//! Preflight checks run before touching ISOs or the USB drive.
//!
//! Validates that the host has the tools each command shells out to and,
//! for loop mounts, that we are running as root. This turns a cryptic
//! `mount` failure on the first ISO into one clear error up front.
//!
//! # Example
//!
//! ```rust
//! use multiboot_usb::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("rsync") {
//!     println!("rsync not installed; falling back to cp");
//! }
//!
//! let tools = &[("mount", "util-linux"), ("blkid", "util-linux")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

/// Check if a command exists on the host's PATH.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools needed to mount and inspect ISOs.
///
/// Each tuple is (command_name, package_name).
pub const DETECT_TOOLS: &[(&str, &str)] = &[("mount", "util-linux"), ("umount", "util-linux")];

/// Tools needed to resolve partition UUIDs.
pub const INSTALL_TOOLS: &[(&str, &str)] = &[("blkid", "util-linux")];

/// Tools needed to copy ISOs; `rsync` is optional.
pub const COPY_TOOLS: &[(&str, &str)] = &[("cp", "coreutils")];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Whether the process runs with an effective UID of 0.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Fail unless running as root; loop mounts need it.
pub fn require_root(action: &str) -> Result<()> {
    if !is_root() {
        bail!("{} requires root privileges (loop mounts); re-run with sudo", action);
    }
    Ok(())
}
