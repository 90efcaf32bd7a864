// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use semver::Version;
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst};
use url::Url;
use vfs::VfsPath;

use crate::errors::ConfigError;

const CONFIG_FILENAME: &str = "pkgsolve.yml";

/// One registry index a project resolves against.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registry {
    url: Url,
}

impl Registry {
    pub fn new(url: Url) -> Registry {
        Registry { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl FromStr for Registry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::from_str(s).map_err(|source| ConfigError::InvalidURL { source })?;

        Ok(Registry { url })
    }
}

#[serde_with::serde_as]
#[derive(Deserialize, Debug)]
pub struct Config {
    // Registries may be given as plain URL strings or as mappings.
    #[serde(rename = "registries")]
    #[serde_as(as = "Vec<PickFirst<(_, DisplayFromStr)>>")]
    registries: Vec<Registry>,

    #[serde(default, rename = "toolsVersion")]
    tools_version: Option<Version>,
}

impl Config {
    pub fn filename() -> &'static str {
        CONFIG_FILENAME
    }

    pub fn registries(&self) -> &[Registry] {
        &self.registries
    }

    pub fn tools_version(&self) -> Option<&Version> {
        self.tools_version.as_ref()
    }
}

impl Config {
    pub fn load(fs: &VfsPath) -> Result<Config, ConfigError> {
        let configfile = fs
            .join(CONFIG_FILENAME)
            .and_then(|path| path.open_file())
            .map_err(|source| ConfigError::NoConfig { source })?;
        let config: Config = serde_yaml::from_reader(configfile)
            .map_err(|source| ConfigError::InvalidConfig { source })?;

        Ok(config)
    }

    /// The closest ancestor of `start` (itself included) that holds a
    /// configuration file.
    pub fn find<P>(start: P) -> Result<PathBuf, ConfigError>
    where
        P: Into<PathBuf>,
    {
        let start = start.into();
        start
            .ancestors()
            .find(|dir| dir.join(CONFIG_FILENAME).is_file())
            .map(|dir| dir.to_path_buf())
            .ok_or(ConfigError::NoTargetDirectoryFound)
    }
}
