// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::resolver::Constraint;
use crate::types::{PackageId, PackageName};

#[derive(Error, Debug)]
pub enum PackageNameError {
    #[error("names must have at least one character")]
    TooShort,

    #[error("names are limited to {limit} characters")]
    TooLong { name: String, limit: usize },

    #[error("names must begin with an ascii letter")]
    NoStartingAlpha { name: String, character: String },

    #[error("names must contain only ascii letters, digits, and dashes")]
    InvalidCharacter { name: String, character: String },

    #[error("dashes may only appear singly, between other characters")]
    MisplacedDash { name: String },
}

#[derive(Error, Debug)]
pub enum PackageSpecifierError {
    #[error("specifier must have a package name")]
    NoPackageName,

    #[error(transparent)]
    InvalidPackageName(#[from] PackageNameError),

    #[error(transparent)]
    InvalidVersionRequirement(#[from] semver::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no configuration file")]
    NoConfig { source: vfs::VfsError },

    #[error("invalid configuration")]
    InvalidConfig { source: serde_yaml::Error },

    #[error("invalid url")]
    InvalidURL { source: url::ParseError },

    #[error("unable to traverse directory")]
    DirectoryTraversalError { source: std::io::Error },

    #[error("unable to locate a valid directory")]
    NoTargetDirectoryFound,
}

#[derive(Error, Debug)]
pub enum PinStoreError {
    #[error("could not access the pin store")]
    PathUnavailable(#[from] vfs::VfsError),

    #[error("could not parse the pin file")]
    InvalidPins { source: serde_yaml::Error },

    #[error("could not lock the pin store")]
    LockUnavailable(#[from] named_lock::Error),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    HTTPError(#[from] reqwest::Error),

    #[error("could not parse JSON data")]
    Deserialize(#[from] serde_json::Error),

    #[error("could not access local file")]
    IoError(#[from] std::io::Error),

    #[error("no registry declares the package {0}")]
    UnknownPackage(PackageName),

    #[error("the registry has no release {version} of {package}")]
    UnknownVersion { package: PackageName, version: String },

    #[error("the registry has no revision {revision} of {package}")]
    UnknownRevision { package: PackageName, revision: String },
}

/// A failure raised inside a container operation. The underlying error is
/// reference counted so that a cached fetch failure can be rethrown to every
/// later request for the same container.
#[derive(Debug, Clone)]
pub struct ProviderError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl ProviderError {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(error: E) -> ProviderError {
        ProviderError(Arc::new(error))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<RegistryError> for ProviderError {
    fn from(error: RegistryError) -> ProviderError {
        ProviderError::new(error)
    }
}

#[derive(Error, Debug, Clone)]
pub enum ResolverError {
    #[error("the requested dependencies cannot be satisfied")]
    Unsatisfiable {
        /// The (possibly minimized) input dependencies responsible for
        /// the conflict.
        dependencies: Vec<Constraint>,
        /// The (possibly minimized) pins responsible for the conflict.
        pins: Vec<Constraint>,
    },

    #[error("the package {0} depends on itself")]
    Cycle(PackageId),

    #[error("the package {package} @ {version} declares non-versioned dependencies")]
    IncompatibleConstraints {
        /// The versioned package whose dependencies were rejected.
        package: PackageId,
        version: String,
        /// The offending dependencies, with a rendering of their requirement.
        requirements: Vec<(PackageId, String)>,
    },

    #[error("the package {package} is pinned to a revision and depends on the local package {local}")]
    RevisionDependencyContainsLocalPackage { package: PackageId, local: PackageId },

    #[error("no available version matches the requirements for {}", render_constraints(.0))]
    MissingVersions(Vec<Constraint>),

    #[error("the resolution was cancelled")]
    Cancelled,

    #[error("the dependency debugger exceeded its time budget")]
    DebuggerTimeout,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn render_constraints(constraints: &[Constraint]) -> String {
    let rendered: Vec<String> = constraints.iter().map(|c| c.package.to_string()).collect();
    rendered.join(", ")
}
