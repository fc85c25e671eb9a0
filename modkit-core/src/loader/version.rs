//! Loader Version Table
//!
//! Static registry mapping host releases to loader revisions, and each revision
//! to the set of package format versions it can load. The table is ordered by
//! strictly increasing revision; the current record is fixed at build time.

use std::fmt;

/// One loader release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRecord {
    /// Ordinal loader revision, strictly increasing across releases
    pub revision: u32,
    /// Release timestamp (seconds since the epoch, 0 when unknown)
    pub timestamp: u64,
    /// Host application release this revision targets
    pub host_version: &'static str,
    /// Human-readable loader version
    pub loader_version: &'static str,
    /// Package format versions this revision accepts
    pub accepted_formats: &'static [&'static str],
}

/// Placeholder record for unknown revisions.
pub const LEGACY: VersionRecord = VersionRecord {
    revision: 0,
    timestamp: 0,
    host_version: "-",
    loader_version: "-",
    accepted_formats: &[],
};

/// Every known release, oldest first.
pub const VERSION_TABLE: &[VersionRecord] = &[
    LEGACY,
    VersionRecord {
        revision: 9,
        timestamp: 0,
        host_version: "1.5.2",
        loader_version: "1.5.2",
        accepted_formats: &["1.5.2"],
    },
    VersionRecord {
        revision: 11,
        timestamp: 0,
        host_version: "1.6.1",
        loader_version: "1.6.1",
        accepted_formats: &["1.6.1", "1.6.r1"],
    },
    VersionRecord {
        revision: 12,
        timestamp: 0,
        host_version: "1.6.2",
        loader_version: "1.6.2",
        accepted_formats: &["1.6.2", "1.6.r2"],
    },
    VersionRecord {
        revision: 13,
        timestamp: 1374709543,
        host_version: "1.6.2",
        loader_version: "1.6.2_02",
        accepted_formats: &["1.6.2", "1.6.r2"],
    },
    VersionRecord {
        revision: 15,
        timestamp: 1375662298,
        host_version: "1.6.2",
        loader_version: "1.6.2_04",
        accepted_formats: &["1.6.2", "1.6.r2"],
    },
    VersionRecord {
        revision: 17,
        timestamp: 1380279938,
        host_version: "1.6.4",
        loader_version: "1.6.4",
        accepted_formats: &["1.6.4", "1.6.r4"],
    },
    VersionRecord {
        revision: 19,
        timestamp: 1380796916,
        host_version: "1.6.4",
        loader_version: "1.6.4_02",
        accepted_formats: &["1.6.4", "1.6.r4"],
    },
    VersionRecord {
        revision: 20,
        timestamp: 1386027226,
        host_version: "1.7.2",
        loader_version: "1.7.2",
        accepted_formats: &["1.7.2", "1.7.r1"],
    },
    VersionRecord {
        revision: 22,
        timestamp: 1391815963,
        host_version: "1.7.2",
        loader_version: "1.7.2_02",
        accepted_formats: &["1.7.2_02"],
    },
    VersionRecord {
        revision: 24,
        timestamp: 1392487926,
        host_version: "1.7.2",
        loader_version: "1.7.2_04",
        accepted_formats: &["1.7.2_02", "1.7.2_03", "1.7.2_04"],
    },
    VersionRecord {
        revision: 25,
        timestamp: 1398870000,
        host_version: "1.7.2",
        loader_version: "1.7.2_05",
        accepted_formats: &["1.7.2_02", "1.7.2_03", "1.7.2_04", "1.7.2_05"],
    },
];

/// Index of the running release in [`VERSION_TABLE`].
const CURRENT_INDEX: usize = VERSION_TABLE.len() - 1;

impl VersionRecord {
    /// The release this build was compiled as.
    pub fn current() -> &'static VersionRecord {
        &VERSION_TABLE[CURRENT_INDEX]
    }

    /// Look up a record by revision, falling back to [`LEGACY`].
    pub fn from_revision(revision: u32) -> &'static VersionRecord {
        VERSION_TABLE
            .iter()
            .find(|v| v.revision == revision)
            .unwrap_or(&VERSION_TABLE[0])
    }

    /// Revision for a loader version string, or the legacy revision if unknown.
    pub fn revision_for_loader_version(loader_version: &str) -> u32 {
        VERSION_TABLE
            .iter()
            .find(|v| v.loader_version == loader_version)
            .map(|v| v.revision)
            .unwrap_or(LEGACY.revision)
    }

    /// Whether packages declaring `format` may be loaded by this revision.
    pub fn is_format_accepted(&self, format: &str) -> bool {
        self.accepted_formats.contains(&format)
    }

    pub fn is_legacy(&self) -> bool {
        self.revision == LEGACY.revision
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_legacy() {
            write!(f, "Unknown")
        } else {
            write!(f, "{}", self.loader_version)
        }
    }
}
