// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

pub use crate::resolver::types::requirement::{BoundVersion, Requirement};
pub use crate::resolver::types::versionset::{VersionRange, VersionSetSpecifier};

mod requirement;
mod versionset;
