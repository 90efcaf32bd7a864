// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Dependency resolution for source packages.
//!
//! The core is [`Resolver`]: a depth-first, lazy, backtracking solver that
//! binds every transitively reachable package to a released version, a
//! revision, or a local checkout, preferring the newest acceptable version
//! of the first package fixed along the way. Package metadata reaches the
//! solver through the [`ContainerProvider`] and [`Container`] traits;
//! [`RegistryProvider`] is the built-in implementation backed by JSON
//! registry indexes.

pub mod config;

mod errors;
mod pins;
mod provider;
mod registry;
mod resolver;
mod types;

pub use crate::errors::{
    ConfigError, PackageNameError, PackageSpecifierError, PinStoreError, ProviderError,
    RegistryError, ResolverError,
};
pub use crate::pins::PinStore;
pub use crate::provider::{Container, ContainerProvider, Delegate};
pub use crate::registry::RegistryProvider;
pub use crate::resolver::{
    Assignment, AssignmentSet, BoundVersion, Constraint, ConstraintSet, Requirement, Resolver,
    VersionRange, VersionSetSpecifier,
};
pub use crate::types::{PackageId, PackageName, PackageSpecifier};
