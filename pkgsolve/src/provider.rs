// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::sync::Arc;

use semver::Version;

use crate::errors::ProviderError;
use crate::resolver::{BoundVersion, Constraint};
use crate::types::PackageId;

/// One package source: the versions it offers and the dependencies each of
/// them declares. Implementations are expected to snapshot or cache their
/// metadata; the resolver asks for dependency lists repeatedly.
pub trait Container: Send + Sync + 'static {
    fn identifier(&self) -> &PackageId;

    /// Every available version, newest first.
    fn versions(&self) -> Result<Vec<Version>, ProviderError>;

    /// Versions for which this returns false are silently skipped during
    /// candidate enumeration.
    fn is_tools_version_compatible(&self, version: &Version) -> bool {
        let _ = version;
        true
    }

    /// The constraints declared by one released version.
    fn dependencies(&self, version: &Version) -> Result<Vec<Constraint>, ProviderError>;

    /// The constraints declared at a revision.
    fn revision_dependencies(&self, revision: &str) -> Result<Vec<Constraint>, ProviderError>;

    /// The constraints declared by the local working copy.
    fn unversioned_dependencies(&self) -> Result<Vec<Constraint>, ProviderError>;

    /// The identity to report once the package is bound. Sources whose true
    /// identity is only known after resolution (a redirected clone, say)
    /// override this.
    fn updated_identifier(&self, binding: &BoundVersion) -> Result<PackageId, ProviderError> {
        let _ = binding;
        Ok(self.identifier().clone())
    }
}

/// Hands out containers. Fetching may be slow (network, clones); the resolver
/// caches every fetch and can overlap them via prefetching, so providers only
/// need to be correct, not clever.
pub trait ContainerProvider: Send + Sync + 'static {
    fn get_container(
        &self,
        package: &PackageId,
        skip_update: bool,
    ) -> Result<Arc<dyn Container>, ProviderError>;
}

/// Optional observer of container fetch lifecycles. Purely informational;
/// it cannot influence the search.
pub trait Delegate: Send + Sync + 'static {
    fn fetching_container(&self, package: &PackageId) {
        let _ = package;
    }

    fn fetched_container(&self, package: &PackageId) {
        let _ = package;
    }
}
