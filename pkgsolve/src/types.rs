// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::VersionReq;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{PackageNameError, PackageSpecifierError};
use crate::resolver::Requirement;

const MAX_NAME_LENGTH: usize = 64;

/// A normalized package name: an ascii letter followed by letters, digits,
/// and single interior dashes, at most 64 characters, compared
/// case-insensitively by lowercasing on construction.
#[derive(Serialize, Deserialize, Clone, Eq, Debug, Hash, Ord, PartialEq, PartialOrd)]
pub struct PackageName(String);

impl PackageName {
    pub(crate) fn new<S: Into<String>>(s: S) -> PackageName {
        PackageName(s.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PackageName {
    type Err = PackageNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut previous: Option<char> = None;
        for c in value.chars() {
            let accepted = match (previous, c) {
                (None, c) => c.is_ascii_alphabetic(),
                (Some('-'), '-') => false,
                (Some(_), c) => c.is_ascii_alphanumeric() || c == '-',
            };
            if !accepted {
                return Err(match previous {
                    None => PackageNameError::NoStartingAlpha {
                        name: value.to_string(),
                        character: c.to_string(),
                    },
                    Some('-') if c == '-' => PackageNameError::MisplacedDash {
                        name: value.to_string(),
                    },
                    Some(_) => PackageNameError::InvalidCharacter {
                        name: value.to_string(),
                        character: c.to_string(),
                    },
                });
            }
            previous = Some(c);
        }

        match previous {
            None => Err(PackageNameError::TooShort),
            Some('-') => Err(PackageNameError::MisplacedDash {
                name: value.to_string(),
            }),
            Some(_) if value.len() > MAX_NAME_LENGTH => Err(PackageNameError::TooLong {
                name: value.to_string(),
                limit: MAX_NAME_LENGTH,
            }),
            Some(_) => Ok(PackageName(value.to_ascii_lowercase())),
        }
    }
}

/// The stable identity of one package: a validated name plus the location
/// of the source that declares it.
#[derive(Serialize, Deserialize, Clone, Eq, Debug, Hash, PartialEq)]
pub struct PackageId {
    name: PackageName,
    location: Url,
}

impl PackageId {
    pub fn new(name: PackageName, location: Url) -> PackageId {
        PackageId { name, location }
    }

    pub fn name(&self) -> &PackageName {
        &self.name
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Rebinds this identity to another location, keeping the name. Used by
    /// containers whose true location is only known after resolution.
    pub fn with_location(&self, location: Url) -> PackageId {
        PackageId {
            name: self.name.clone(),
            location,
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.name.cmp(&other.name) {
            Ordering::Equal => self.location.cmp(&other.location),
            ordering => ordering,
        }
    }
}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A user-facing request for one package, parsed from `name` or
/// `name<requirement>` (e.g. `lodepng>=2.0, <3.0`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageSpecifier {
    pub(crate) name: PackageName,
    pub(crate) version: VersionReq,
}

impl PackageSpecifier {
    pub fn name(&self) -> &PackageName {
        &self.name
    }

    pub fn requirement(&self) -> Requirement {
        Requirement::from(self.version.clone())
    }
}

impl fmt::Display for PackageSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.name, self.version)
    }
}

impl FromStr for PackageSpecifier {
    type Err = PackageSpecifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name_s, version_s) = match value.find(|c: char| !c.is_ascii_alphanumeric() && c != '-')
        {
            Some(idx) => value.split_at(idx),
            None => (value, "*"),
        };

        let name: PackageName = name_s.parse()?;
        let version: VersionReq = version_s.parse()?;

        Ok(PackageSpecifier { name, version })
    }
}
