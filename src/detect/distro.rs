//! Distribution classification.
//!
//! Two ordered rule tables decide the tag; the first hit wins:
//!
//! 1. [`DISK_INFO_RULES`] - substrings of the lowercased `/.disk/info` file.
//!    If that file exists but nothing matches, the ISO is plain Debian.
//! 2. [`FINGERPRINT_RULES`] - files and directories characteristic of a
//!    distribution's live layout.
//!
//! Derivatives that copy another distribution's layout (Antergos ships an
//! `arch/` tree) are classified by whichever rule comes first.

use serde::Serialize;
use std::fmt;

use crate::glob::{expand, Pattern};
use crate::tree::IsoTree;

/// Release metadata written by Debian-derived image builders.
pub const DISK_INFO_PATH: &str = ".disk/info";

/// Linux distribution family of an ISO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Distribution {
    Ubuntu,
    Kubuntu,
    Xubuntu,
    Lubuntu,
    Mint,
    Elementary,
    Debian,
    DebianLive,
    Arch,
    Manjaro,
    Antergos,
    Fedora,
    Centos,
    Opensuse,
    Unknown,
}

impl Distribution {
    pub const ALL: [Distribution; 15] = [
        Distribution::Ubuntu,
        Distribution::Kubuntu,
        Distribution::Xubuntu,
        Distribution::Lubuntu,
        Distribution::Mint,
        Distribution::Elementary,
        Distribution::Debian,
        Distribution::DebianLive,
        Distribution::Arch,
        Distribution::Manjaro,
        Distribution::Antergos,
        Distribution::Fedora,
        Distribution::Centos,
        Distribution::Opensuse,
        Distribution::Unknown,
    ];

    /// Short machine tag, as used in reports.
    pub fn tag(self) -> &'static str {
        match self {
            Distribution::Ubuntu => "ubuntu",
            Distribution::Kubuntu => "kubuntu",
            Distribution::Xubuntu => "xubuntu",
            Distribution::Lubuntu => "lubuntu",
            Distribution::Mint => "mint",
            Distribution::Elementary => "elementary",
            Distribution::Debian => "debian",
            Distribution::DebianLive => "debian-live",
            Distribution::Arch => "arch",
            Distribution::Manjaro => "manjaro",
            Distribution::Antergos => "antergos",
            Distribution::Fedora => "fedora",
            Distribution::Centos => "centos",
            Distribution::Opensuse => "opensuse",
            Distribution::Unknown => "unknown",
        }
    }

    /// Human-readable name for menu titles.
    pub fn display_name(self) -> &'static str {
        match self {
            Distribution::Ubuntu => "Ubuntu",
            Distribution::Kubuntu => "Kubuntu",
            Distribution::Xubuntu => "Xubuntu",
            Distribution::Lubuntu => "Lubuntu",
            Distribution::Mint => "Linux Mint",
            Distribution::Elementary => "elementary OS",
            Distribution::Debian => "Debian",
            Distribution::DebianLive => "Debian Live",
            Distribution::Arch => "Arch Linux",
            Distribution::Manjaro => "Manjaro",
            Distribution::Antergos => "Antergos",
            Distribution::Fedora => "Fedora",
            Distribution::Centos => "CentOS",
            Distribution::Opensuse => "openSUSE",
            Distribution::Unknown => "Linux",
        }
    }

    /// GRUB theme icon classes, most specific first.
    pub fn class_tags(self) -> &'static [&'static str] {
        match self {
            Distribution::Ubuntu => &["ubuntu", "gnu-linux", "gnu", "os"],
            Distribution::Kubuntu => &["kubuntu", "ubuntu", "gnu-linux", "gnu", "os"],
            Distribution::Xubuntu => &["xubuntu", "ubuntu", "gnu-linux", "gnu", "os"],
            Distribution::Lubuntu => &["lubuntu", "ubuntu", "gnu-linux", "gnu", "os"],
            Distribution::Mint => &["linuxmint", "gnu-linux", "gnu", "os"],
            Distribution::Elementary => &["elementary", "gnu-linux", "gnu", "os"],
            Distribution::Debian | Distribution::DebianLive => {
                &["debian", "gnu-linux", "gnu", "os"]
            }
            Distribution::Arch => &["arch", "gnu-linux", "gnu", "os"],
            Distribution::Manjaro => &["manjaro", "arch", "gnu-linux", "gnu", "os"],
            Distribution::Antergos => &["antergos", "arch", "gnu-linux", "gnu", "os"],
            Distribution::Fedora => &["fedora", "gnu-linux", "gnu", "os"],
            Distribution::Centos => &["centos", "gnu-linux", "gnu", "os"],
            Distribution::Opensuse => &["opensuse", "gnu-linux", "gnu", "os"],
            Distribution::Unknown => &["gnu-linux", "gnu", "os"],
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// `/.disk/info` substring table. Flavours precede plain `ubuntu`.
pub const DISK_INFO_RULES: &[(&str, Distribution)] = &[
    ("kubuntu", Distribution::Kubuntu),
    ("xubuntu", Distribution::Xubuntu),
    ("lubuntu", Distribution::Lubuntu),
    ("ubuntu", Distribution::Ubuntu),
    ("mint", Distribution::Mint),
    ("elementary", Distribution::Elementary),
];

/// A single piece of evidence looked up in the ISO tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// A file or directory exists at the path.
    Exists(&'static str),
    /// The glob has at least one match.
    Glob(&'static str),
    /// The file exists and its lowercased text contains the needle.
    Contains(&'static str, &'static str),
}

impl Marker {
    pub fn is_present(&self, tree: &dyn IsoTree) -> bool {
        match *self {
            Marker::Exists(path) => tree.exists(path),
            Marker::Glob(pattern) => !expand(tree, &Pattern::new(pattern)).is_empty(),
            Marker::Contains(path, needle) => tree
                .read_text_lossy(path)
                .is_some_and(|text| text.to_lowercase().contains(needle)),
        }
    }
}

/// A fingerprint rule: any marker present selects the distribution.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub distribution: Distribution,
    pub any_of: &'static [Marker],
}

impl Rule {
    pub fn matches(&self, tree: &dyn IsoTree) -> bool {
        self.any_of.iter().any(|marker| marker.is_present(tree))
    }
}

/// Directory fingerprints, evaluated top to bottom when `/.disk/info` is absent.
pub const FINGERPRINT_RULES: &[Rule] = &[
    Rule {
        distribution: Distribution::Arch,
        any_of: &[Marker::Exists("arch/boot/x86_64/vmlinuz-linux")],
    },
    Rule {
        distribution: Distribution::Opensuse,
        any_of: &[
            Marker::Exists("boot/x86_64/loader/linux"),
            Marker::Exists("media.1/products"),
        ],
    },
    Rule {
        distribution: Distribution::Fedora,
        any_of: &[
            Marker::Contains(".treeinfo", "fedora"),
            Marker::Contains(".discinfo", "fedora"),
            Marker::Exists("LiveOS/squashfs.img"),
        ],
    },
    Rule {
        distribution: Distribution::Centos,
        any_of: &[
            Marker::Contains(".treeinfo", "centos"),
            Marker::Contains(".discinfo", "centos"),
            Marker::Exists("CentOS"),
        ],
    },
    Rule {
        distribution: Distribution::DebianLive,
        any_of: &[Marker::Glob("live/vmlinuz*")],
    },
    Rule {
        distribution: Distribution::Manjaro,
        any_of: &[Marker::Exists(".miso"), Marker::Exists("manjaro")],
    },
    Rule {
        distribution: Distribution::Antergos,
        any_of: &[Marker::Exists("antergos")],
    },
];

/// Classify a `/.disk/info` text. Anything unrecognised is Debian.
pub fn classify_disk_info(text: &str) -> Distribution {
    let text = text.to_lowercase();
    DISK_INFO_RULES
        .iter()
        .find(|(needle, _)| text.contains(needle))
        .map(|(_, distribution)| *distribution)
        .unwrap_or(Distribution::Debian)
}

/// Classify the distribution contained in an ISO tree.
pub fn classify(tree: &dyn IsoTree) -> Distribution {
    if tree.exists(DISK_INFO_PATH) {
        let text = tree.read_text_lossy(DISK_INFO_PATH).unwrap_or_default();
        return classify_disk_info(&text);
    }

    FINGERPRINT_RULES
        .iter()
        .find(|rule| rule.matches(tree))
        .map(|rule| rule.distribution)
        .unwrap_or(Distribution::Unknown)
}
