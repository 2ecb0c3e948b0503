//! Filesystem UUID lookup through `blkid`.

use anyhow::Result;
use std::path::Path;

use crate::process::Cmd;

/// Filesystem UUID of a block device. May be empty if the device has no
/// filesystem or blkid reports nothing.
pub fn query_uuid(device: &Path) -> Result<String> {
    let result = Cmd::new("blkid")
        .args(["-s", "UUID", "-o", "value"])
        .arg_path(device)
        .allow_fail()
        .run()?;

    // blkid exits 2 when the tag is absent; that is an empty UUID, not a failure.
    match result.status.code() {
        Some(0) => Ok(parse_uuid_output(&result.stdout)),
        Some(2) => Ok(String::new()),
        _ => anyhow::bail!(
            "blkid failed for '{}' ({}): {}",
            device.display(),
            result.status,
            result.stderr.trim()
        ),
    }
}

/// First non-empty line of `blkid -o value` output.
pub fn parse_uuid_output(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_output() {
        assert_eq!(parse_uuid_output("0A1B-2C3D\n"), "0A1B-2C3D");
        assert_eq!(
            parse_uuid_output("\n  3e6be9de-8139-11d1-9106-a43f08d823a6  \n"),
            "3e6be9de-8139-11d1-9106-a43f08d823a6"
        );
        assert_eq!(parse_uuid_output(""), "");
    }
}
