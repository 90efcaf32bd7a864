// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{info, log_enabled, trace};
use reqwest::blocking::Client as HTTPClient;
use semver::{Version, VersionReq};
use serde::Deserialize;

use crate::config::Registry;
use crate::errors::{ProviderError, RegistryError};
use crate::provider::{Container, ContainerProvider};
use crate::resolver::{Constraint, Requirement};
use crate::types::{PackageId, PackageName};

const LOGNAME: &str = "pkgsolve::registry";

type Result<T, E = RegistryError> = core::result::Result<T, E>;

#[derive(Deserialize, Debug)]
struct MetaData {
    #[serde(rename = "name")]
    _name: String,
}

/// How one dependency is expressed in the index: a version requirement
/// string, a pinned revision, or the local working copy.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum DependencySpec {
    Version(VersionReq),
    Revision { revision: String },
    Local { local: bool },
}

#[derive(Deserialize, Debug)]
struct Release {
    #[serde(default)]
    dependencies: BTreeMap<PackageName, DependencySpec>,
    #[serde(default, rename = "toolsVersion")]
    tools_version: Option<Version>,
}

#[derive(Deserialize, Debug)]
struct PackageData {
    #[serde(default)]
    releases: BTreeMap<Version, Release>,
    #[serde(default)]
    revisions: HashMap<String, Release>,
    #[serde(default)]
    local: Option<Release>,
}

#[derive(Deserialize, Debug)]
struct RepoData {
    #[serde(rename = "meta")]
    _meta: MetaData,
    packages: HashMap<PackageName, PackageData>,
}

/// A [`ContainerProvider`] backed by JSON registry indexes.
///
/// Indexes are fetched once, up front; handing out containers afterwards is
/// pure lookup, so the resolver's cache and prefetching cost nothing extra
/// here beyond what they would against a cloning provider.
#[derive(Debug)]
pub struct RegistryProvider {
    client: HTTPClient,
    tools_version: Version,
    data: IndexMap<Registry, RepoData>,
}

impl RegistryProvider {
    pub fn new() -> Result<RegistryProvider> {
        let client = HTTPClient::builder().gzip(true).build()?;
        let data = IndexMap::<Registry, RepoData>::new();

        Ok(RegistryProvider {
            client,
            tools_version: Version::new(1, 0, 0),
            data,
        })
    }

    /// The tools version releases are gated against; releases declaring a
    /// higher minimum are skipped silently during resolution.
    pub fn with_tools_version(mut self, tools_version: Version) -> RegistryProvider {
        self.tools_version = tools_version;
        self
    }

    pub fn fetch(
        mut self,
        registries: &[Registry],
        callback: impl Fn(),
    ) -> Result<RegistryProvider> {
        info!(target: LOGNAME, "fetching registry indexes");
        for registry in registries.iter() {
            let data: RepoData = match registry.url().scheme() {
                "file" => {
                    let file = File::open(registry.url().to_file_path().unwrap())?;
                    let reader = BufReader::new(file);

                    serde_json::from_reader(reader)?
                }
                _ => self
                    .client
                    .get(registry.url().clone())
                    .send()?
                    .error_for_status()?
                    .json()?,
            };
            self.data.insert(registry.clone(), data);
            (callback)();
        }

        Ok(self)
    }

    /// The identity of a named package: its name plus the URL of the first
    /// registry that declares it, in configuration order.
    pub fn package_id(&self, name: &PackageName) -> Option<PackageId> {
        for (registry, data) in self.data.iter() {
            if data.packages.contains_key(name) {
                return Some(PackageId::new(name.clone(), registry.url().clone()));
            }
        }
        None
    }

    fn convert(
        &self,
        dependencies: &BTreeMap<PackageName, DependencySpec>,
        declaring: &Registry,
    ) -> Vec<Constraint> {
        dependencies
            .iter()
            .map(|(name, spec)| {
                // A dependency declared nowhere keeps the identity of the
                // registry that mentions it; resolution will then report it
                // as unknown.
                let package = self
                    .package_id(name)
                    .unwrap_or_else(|| PackageId::new(name.clone(), declaring.url().clone()));
                let requirement = match spec {
                    DependencySpec::Version(req) => Requirement::from(req),
                    DependencySpec::Revision { revision } => {
                        Requirement::Revision(revision.clone())
                    }
                    DependencySpec::Local { .. } => Requirement::Unversioned,
                };
                Constraint::new(package, requirement)
            })
            .collect()
    }
}

impl ContainerProvider for RegistryProvider {
    fn get_container(
        &self,
        package: &PackageId,
        _skip_update: bool,
    ) -> core::result::Result<Arc<dyn Container>, ProviderError> {
        let name = package.name();
        let mut releases: BTreeMap<Version, (Vec<Constraint>, Option<Version>)> = BTreeMap::new();
        let mut revisions: HashMap<String, Vec<Constraint>> = HashMap::new();
        let mut local: Option<Vec<Constraint>> = None;
        let mut found = false;

        // Later registries override earlier ones release by release, while
        // the package keeps the identity of the first registry declaring it.
        for (registry, data) in self.data.iter() {
            if let Some(declared) = data.packages.get(name) {
                found = true;
                for (version, release) in declared.releases.iter() {
                    releases.insert(
                        version.clone(),
                        (
                            self.convert(&release.dependencies, registry),
                            release.tools_version.clone(),
                        ),
                    );
                }
                for (revision, release) in declared.revisions.iter() {
                    revisions.insert(
                        revision.clone(),
                        self.convert(&release.dependencies, registry),
                    );
                }
                if let Some(release) = &declared.local {
                    local = Some(self.convert(&release.dependencies, registry));
                }
            }
        }

        if !found {
            return Err(RegistryError::UnknownPackage(name.clone()).into());
        }

        // Newest first; the resolver relies on this ordering.
        let mut versions: Vec<Version> = releases.keys().cloned().collect();
        versions.reverse();

        if log_enabled!(log::Level::Trace) {
            let versions_str: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
            trace!(
                target: LOGNAME,
                "found versions for {}: [{}]",
                package,
                versions_str.join(", ")
            );
        }

        Ok(Arc::new(RegistryContainer {
            id: package.clone(),
            tools_version: self.tools_version.clone(),
            versions,
            releases,
            revisions,
            local,
        }))
    }
}

struct RegistryContainer {
    id: PackageId,
    tools_version: Version,
    versions: Vec<Version>,
    releases: BTreeMap<Version, (Vec<Constraint>, Option<Version>)>,
    revisions: HashMap<String, Vec<Constraint>>,
    local: Option<Vec<Constraint>>,
}

impl Container for RegistryContainer {
    fn identifier(&self) -> &PackageId {
        &self.id
    }

    fn versions(&self) -> core::result::Result<Vec<Version>, ProviderError> {
        Ok(self.versions.clone())
    }

    fn is_tools_version_compatible(&self, version: &Version) -> bool {
        match self.releases.get(version) {
            Some((_, Some(minimum))) => *minimum <= self.tools_version,
            _ => true,
        }
    }

    fn dependencies(
        &self,
        version: &Version,
    ) -> core::result::Result<Vec<Constraint>, ProviderError> {
        match self.releases.get(version) {
            Some((dependencies, _)) => Ok(dependencies.clone()),
            None => Err(RegistryError::UnknownVersion {
                package: self.id.name().clone(),
                version: version.to_string(),
            }
            .into()),
        }
    }

    fn revision_dependencies(
        &self,
        revision: &str,
    ) -> core::result::Result<Vec<Constraint>, ProviderError> {
        match self.revisions.get(revision) {
            Some(dependencies) => Ok(dependencies.clone()),
            None => Err(RegistryError::UnknownRevision {
                package: self.id.name().clone(),
                revision: revision.to_string(),
            }
            .into()),
        }
    }

    fn unversioned_dependencies(&self) -> core::result::Result<Vec<Constraint>, ProviderError> {
        // A package with no local checkout declared simply brings nothing
        // along when forced in unversioned.
        Ok(self.local.clone().unwrap_or_default())
    }
}
