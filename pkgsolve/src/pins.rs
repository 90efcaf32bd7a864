// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::collections::BTreeMap;

use log::trace;
use named_lock::NamedLock;
use semver::Version;
use serde::{Deserialize, Serialize};
use url::Url;
use vfs::VfsPath;

use crate::errors::PinStoreError;
use crate::resolver::{BoundVersion, Constraint, Requirement};
use crate::types::{PackageId, PackageName};

const LOGNAME: &str = "pkgsolve::pins";
const PINS_FILE: &str = "pkgsolve.lock";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum PinnedAt {
    Version(Version),
    Revision(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct Pin {
    name: PackageName,
    location: Url,
    pinned: PinnedAt,
}

#[derive(Serialize, Deserialize, Default, Debug)]
#[serde(default)]
struct PinFile {
    pins: BTreeMap<PackageName, Pin>,
}

type PinResult<T> = Result<T, PinStoreError>;

/// The on-disk record of what a previous resolution chose, fed back into the
/// next one as pin constraints.
///
/// Saving takes a cross-process named lock so two invocations working on the
/// same target cannot interleave their writes.
pub struct PinStore {
    fs: VfsPath,
    lock: NamedLock,
    state: PinFile,
}

impl PinStore {
    pub fn new(fs: VfsPath, rid: &str) -> PinResult<PinStore> {
        // We're using MD5 here because it's short and fast, we're not using
        // this in a security sensitive aspect.
        let lock = NamedLock::create(&format!("pkgsolve.{:x}", md5::compute(rid)))?;
        let state = PinStore::load_state(&fs)?;

        Ok(PinStore { fs, lock, state })
    }

    pub fn is_empty(&self) -> bool {
        self.state.pins.is_empty()
    }

    /// The pins as resolver constraints, in name order.
    pub fn constraints(&self) -> Vec<Constraint> {
        self.state
            .pins
            .values()
            .map(|pin| {
                let requirement = match &pin.pinned {
                    PinnedAt::Version(version) => Requirement::exact(version.clone()),
                    PinnedAt::Revision(revision) => Requirement::Revision(revision.clone()),
                };
                Constraint::new(
                    PackageId::new(pin.name.clone(), pin.location.clone()),
                    requirement,
                )
            })
            .collect()
    }

    /// Records the binding chosen for a package. Unversioned and excluded
    /// outcomes are not pinnable and clear any previous pin instead.
    pub fn pin(&mut self, package: &PackageId, binding: &BoundVersion) {
        let pinned = match binding {
            BoundVersion::Version(version) => PinnedAt::Version(version.clone()),
            BoundVersion::Revision(revision) => PinnedAt::Revision(revision.clone()),
            BoundVersion::Unversioned | BoundVersion::Excluded => {
                if self.state.pins.remove(package.name()).is_some() {
                    trace!(target: LOGNAME, "unpinned {}", package);
                }
                return;
            }
        };
        self.state.pins.insert(
            package.name().clone(),
            Pin {
                name: package.name().clone(),
                location: package.location().clone(),
                pinned,
            },
        );
    }

    pub fn save(&self) -> PinResult<()> {
        let _guard = self.lock.lock()?;

        let file = self.fs.join(PINS_FILE)?.create_file()?;
        serde_yaml::to_writer(file, &self.state)
            .map_err(|source| PinStoreError::InvalidPins { source })?;
        Ok(())
    }

    fn load_state(fs: &VfsPath) -> PinResult<PinFile> {
        let filename = fs.join(PINS_FILE)?;
        let state: PinFile = if filename.is_file()? {
            serde_yaml::from_reader(filename.open_file()?)
                .map_err(|source| PinStoreError::InvalidPins { source })?
        } else {
            PinFile {
                ..Default::default()
            }
        };

        Ok(state)
    }
}
