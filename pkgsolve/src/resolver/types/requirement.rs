// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::fmt;

use semver::{Version, VersionReq};

use crate::resolver::types::versionset::VersionSetSpecifier;

/// What a dependent will accept for one package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Any version inside the set.
    VersionSet(VersionSetSpecifier),
    /// Exactly the named revision (a commit hash, a branch, a tag).
    Revision(String),
    /// The local working copy, used directly.
    Unversioned,
}

impl Requirement {
    pub fn any() -> Requirement {
        Requirement::VersionSet(VersionSetSpecifier::Any)
    }

    pub fn exact(version: Version) -> Requirement {
        Requirement::VersionSet(VersionSetSpecifier::Exact(version))
    }

    pub(crate) fn is_versioned(&self) -> bool {
        matches!(self, Requirement::VersionSet(_))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Requirement::VersionSet(set) => write!(f, "{}", set),
            Requirement::Revision(revision) => write!(f, "revision {}", revision),
            Requirement::Unversioned => write!(f, "unversioned"),
        }
    }
}

impl From<VersionReq> for Requirement {
    fn from(req: VersionReq) -> Requirement {
        Requirement::VersionSet(VersionSetSpecifier::from(&req))
    }
}

impl From<&VersionReq> for Requirement {
    fn from(req: &VersionReq) -> Requirement {
        Requirement::VersionSet(VersionSetSpecifier::from(req))
    }
}

/// The concrete outcome chosen for one package in an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundVersion {
    /// The package may not be present in the assignment at all.
    Excluded,
    /// Bound to a released version.
    Version(Version),
    /// Bound to a revision.
    Revision(String),
    /// Bound to the local working copy.
    Unversioned,
}

impl fmt::Display for BoundVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoundVersion::Excluded => write!(f, "excluded"),
            BoundVersion::Version(version) => write!(f, "{}", version),
            BoundVersion::Revision(revision) => write!(f, "{}", revision),
            BoundVersion::Unversioned => write!(f, "unversioned"),
        }
    }
}
