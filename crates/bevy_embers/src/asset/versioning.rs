struct FormatVersion {
    version: &'static str,
    breaking: bool,
}

// all known emitter file versions, oldest first. the last entry is the current one.
const FORMAT_VERSIONS: &[FormatVersion] = &[FormatVersion {
    version: "0.1",
    breaking: false,
}]; // initial

/// Outcome of checking an emitter file's `embers_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionStatus {
    /// Written by the current format.
    Current,
    /// Older, but every step up to the current version is compatible.
    Outdated {
        /// The version found in the file.
        found: String,
        /// The current format version.
        current: &'static str,
    },
    /// Older, with a breaking change somewhere on the way to the current version.
    Incompatible {
        /// The version found in the file.
        found: String,
        /// The current format version.
        current: &'static str,
    },
    /// Not a version this crate knows about.
    Unknown,
}

/// Returns the version string written into new emitter files.
pub fn current_format_version() -> &'static str {
    FORMAT_VERSIONS[FORMAT_VERSIONS.len() - 1].version
}

fn find_version_index(version: &str) -> Option<usize> {
    FORMAT_VERSIONS.iter().position(|v| v.version == version)
}

/// Returns `true` if no breaking version lies in `(from, to]`.
pub fn can_auto_upgrade(from: &str, to: &str) -> bool {
    let (Some(from_idx), Some(to_idx)) = (find_version_index(from), find_version_index(to)) else {
        return false;
    };
    from_idx < to_idx && !FORMAT_VERSIONS[from_idx + 1..=to_idx].iter().any(|v| v.breaking)
}

/// Classifies `version` against the current format version.
pub fn validate_version(version: &str) -> VersionStatus {
    let current = current_format_version();
    if version == current {
        VersionStatus::Current
    } else if find_version_index(version).is_none() {
        VersionStatus::Unknown
    } else if can_auto_upgrade(version, current) {
        VersionStatus::Outdated {
            found: version.to_string(),
            current,
        }
    } else {
        VersionStatus::Incompatible {
            found: version.to_string(),
            current,
        }
    }
}
