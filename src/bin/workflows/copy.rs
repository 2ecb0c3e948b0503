use std::path::Path;

use anyhow::{bail, Result};
use multiboot_usb::copy::copy_isos;
use multiboot_usb::preflight::{check_required_tools, command_exists, COPY_TOOLS};
use multiboot_usb::scan::find_isos;
use multiboot_usb::Settings;

pub(crate) fn copy_cmd(settings: &Settings, dest: &Path, verify: bool) -> Result<()> {
    check_required_tools(COPY_TOOLS)?;
    if !command_exists("rsync") {
        log::warn!("[copy] rsync not installed; falling back to cp");
    }

    let isos = find_isos(&settings.iso_dir, settings.recursive)?;
    if isos.is_empty() {
        bail!("no ISO images found in '{}'", settings.iso_dir.display());
    }

    let copied = copy_isos(&isos, dest, verify)?;
    println!("Copied {} ISO(s) to {}", copied.len(), dest.display());
    Ok(())
}
