//! Kernel command-line templates per distribution.
//!
//! Templates use `{iso}` for the ISO path on the data partition and
//! `{label}` for the data partition's filesystem label. The UUID token
//! [`DATA_UUID_PLACEHOLDER`] is left in place and resolved when the
//! configuration is installed onto the drive.

use super::distro::Distribution;

/// Substituted with the data partition's filesystem UUID at install time.
pub const DATA_UUID_PLACEHOLDER: &str = "@DATA_UUID@";

/// Substituted with the EFI system partition's filesystem UUID at install time.
pub const EFI_UUID_PLACEHOLDER: &str = "@EFI_UUID@";

const CASPER: &str = "boot=casper iso-scan/filename={iso} noprompt noeject quiet splash";
const DEBIAN: &str = "iso-scan/filename={iso} priority=high quiet";
const DEBIAN_LIVE: &str = "boot=live findiso={iso} components quiet splash";
const ARCH: &str = "img_dev=/dev/disk/by-uuid/@DATA_UUID@ img_loop={iso} earlymodules=loop";
const MANJARO: &str =
    "img_dev=/dev/disk/by-uuid/@DATA_UUID@ img_loop={iso} misobasedir=manjaro driver=free";
const ANTERGOS: &str = "img_dev=/dev/disk/by-uuid/@DATA_UUID@ img_loop={iso} archisobasedir=arch";
const REDHAT_LIVE: &str = "root=live:CDLABEL={label} iso-scan/filename={iso} rd.live.image quiet";
const OPENSUSE: &str =
    "isofrom_device=/dev/disk/by-uuid/@DATA_UUID@ isofrom_system={iso} loader=syslinux";

/// Used for unrecognised ISOs and for generic fallback entries.
pub const GENERIC_TEMPLATE: &str = "iso-scan/filename={iso}";

/// Raw template for a distribution.
pub fn template(distribution: Distribution) -> &'static str {
    match distribution {
        Distribution::Ubuntu
        | Distribution::Kubuntu
        | Distribution::Xubuntu
        | Distribution::Lubuntu
        | Distribution::Mint
        | Distribution::Elementary => CASPER,
        Distribution::Debian => DEBIAN,
        Distribution::DebianLive => DEBIAN_LIVE,
        Distribution::Arch => ARCH,
        Distribution::Manjaro => MANJARO,
        Distribution::Antergos => ANTERGOS,
        Distribution::Fedora | Distribution::Centos => REDHAT_LIVE,
        Distribution::Opensuse => OPENSUSE,
        Distribution::Unknown => GENERIC_TEMPLATE,
    }
}

/// Where the ISO lives once copied onto the drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootTarget {
    /// Absolute path of the ISO on the data partition, e.g. `/isos/a.iso`.
    pub iso_path: String,
    /// Filesystem label of the data partition.
    pub label: String,
}

const ISO_TOKEN: &str = "{iso}";
const LABEL_TOKEN: &str = "{label}";

/// Fill a template for `target`.
///
/// Tokens are substituted in a single pass, so a `{label}` that is part of
/// the ISO file name stays as written.
pub fn render(template: &str, target: &BootTarget) -> String {
    let mut out = String::with_capacity(template.len() + target.iso_path.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix(ISO_TOKEN) {
            out.push_str(&target.iso_path);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(LABEL_TOKEN) {
            out.push_str(&target.label);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Kernel parameters for `distribution` booting the ISO at `target`.
pub fn boot_parameters(distribution: Distribution, target: &BootTarget) -> String {
    render(template(distribution), target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> BootTarget {
        BootTarget {
            iso_path: "/isos/test.iso".to_string(),
            label: "MULTIBOOT".to_string(),
        }
    }

    #[test]
    fn test_every_template_mentions_the_iso() {
        for distribution in Distribution::ALL {
            assert!(
                template(distribution).contains("{iso}"),
                "{distribution} template has no iso placeholder"
            );
        }
    }

    #[test]
    fn test_family_parameters() {
        let t = target();
        assert!(boot_parameters(Distribution::Xubuntu, &t).contains("boot=casper"));
        assert!(boot_parameters(Distribution::Arch, &t).contains("img_loop=/isos/test.iso"));
        assert!(boot_parameters(Distribution::DebianLive, &t).contains("findiso=/isos/test.iso"));
        assert_eq!(
            boot_parameters(Distribution::Fedora, &t),
            "root=live:CDLABEL=MULTIBOOT iso-scan/filename=/isos/test.iso rd.live.image quiet"
        );
    }

    #[test]
    fn test_unknown_is_generic() {
        assert_eq!(
            boot_parameters(Distribution::Unknown, &target()),
            "iso-scan/filename=/isos/test.iso"
        );
    }

    #[test]
    fn test_tokens_in_values_are_not_expanded() {
        let t = BootTarget {
            iso_path: "/isos/x{label}.iso".to_string(),
            label: "MULTIBOOT".to_string(),
        };
        assert_eq!(
            boot_parameters(Distribution::Fedora, &t),
            "root=live:CDLABEL=MULTIBOOT iso-scan/filename=/isos/x{label}.iso rd.live.image quiet"
        );
        assert_eq!(render("{a}{iso", &t), "{a}{iso");
    }

    #[test]
    fn test_uuid_placeholder_survives_rendering() {
        let params = boot_parameters(Distribution::Opensuse, &target());
        assert!(params.contains(DATA_UUID_PLACEHOLDER));
        assert!(!params.contains('{'));
    }
}
