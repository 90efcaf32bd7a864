// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use console::style;
use vfs::{PhysicalFS, VfsPath};

use pkgsolve::config::Config;
use pkgsolve::{
    Constraint, Delegate, PackageId, PackageSpecifier, PinStore, RegistryProvider, Resolver,
    ResolverError,
};

use crate::progress::ProgressTracker;

mod progress;

#[derive(Parser, Debug)]
#[clap(version)]
struct Cli {
    #[clap(global = true, short, long)]
    target: Option<Utf8PathBuf>,

    #[clap(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve the requested packages against the configured registries and
    /// record the outcome as pins.
    Resolve {
        #[clap(required = true)]
        packages: Vec<PackageSpecifier>,
    },
}

fn main() -> Result<()> {
    // Parse our CLI parameters and wire the bar-aware logger up before
    // anything can log.
    let cli = Cli::parse();
    let progress = ProgressTracker::new();
    progress::install_logger(cli.verbose.log_level_filter(), progress.clone());

    let root = match cli.target {
        Some(target) => canonicalize(target)?,
        None => {
            let found = Config::find(current_dir()?).with_context(|| {
                format!(
                    "unable to find '{}' in current directory or parents",
                    Config::filename()
                )
            })?;
            Utf8PathBuf::try_from(found)?
        }
    };

    let fs: VfsPath = PhysicalFS::new(PathBuf::from(&root)).into();
    let config =
        Config::load(&fs).with_context(|| format!("invalid target directory '{}'", root))?;

    match &cli.command {
        Commands::Resolve { packages } => resolve(&config, &fs, root.as_str(), packages, &progress),
    }
}

fn resolve(
    config: &Config,
    fs: &VfsPath,
    rid: &str,
    packages: &[PackageSpecifier],
    progress: &ProgressTracker,
) -> Result<()> {
    // Fetch every configured registry index up front.
    progress.start("registry", "fetching registry indexes");
    let mut provider = RegistryProvider::new()?;
    if let Some(tools_version) = config.tools_version() {
        provider = provider.with_tools_version(tools_version.clone());
    }
    let fetched = provider.fetch(config.registries(), || progress.tick("registry"));
    progress.finish("registry");
    let provider = fetched.context("unable to fetch the configured registries")?;

    // Turn the requested specifiers into resolver constraints.
    let mut dependencies = Vec::with_capacity(packages.len());
    for spec in packages {
        let package = provider
            .package_id(spec.name())
            .ok_or_else(|| anyhow!("no configured registry declares '{}'", spec.name()))?;
        dependencies.push(Constraint::new(package, spec.requirement()));
    }

    let mut pins = PinStore::new(fs.clone(), rid)
        .with_context(|| format!("could not open the pin store in '{}'", rid))?;

    let delegate = Arc::new(FetchProgress::new(progress.clone()));
    let resolver = Resolver::new(
        Arc::new(provider),
        Some(delegate as Arc<dyn Delegate>),
        true,
        false,
    );

    match resolver.resolve(&dependencies, &pins.constraints()) {
        Ok(bindings) => {
            for (package, binding) in &bindings {
                println!("{} {}", style(package).green(), binding);
                pins.pin(package, binding);
            }
            pins.save().context("could not record the pins")?;
            Ok(())
        }
        Err(ResolverError::Unsatisfiable { dependencies, pins }) => {
            eprintln!(
                "{}",
                style("unable to resolve the requested packages; the conflict involves:").red()
            );
            for constraint in &dependencies {
                eprintln!("  requires {}", constraint);
            }
            for pin in &pins {
                eprintln!("  pinned   {}", pin);
            }
            Err(anyhow!("resolution failed"))
        }
        Err(error) => Err(error.into()),
    }
}

/// Collapses the resolver's concurrent fetch callbacks into one spinner.
struct FetchProgress {
    progress: ProgressTracker,
    in_flight: Mutex<usize>,
}

impl FetchProgress {
    fn new(progress: ProgressTracker) -> FetchProgress {
        FetchProgress {
            progress,
            in_flight: Mutex::new(0),
        }
    }
}

impl Delegate for FetchProgress {
    fn fetching_container(&self, package: &PackageId) {
        let mut in_flight = self.in_flight.lock().unwrap();
        *in_flight += 1;
        if *in_flight == 1 {
            self.progress.start("fetch", format!("fetching {}", package));
        } else {
            self.progress
                .update("fetch", format!("fetching {} containers", *in_flight));
        }
    }

    fn fetched_container(&self, _package: &PackageId) {
        let mut in_flight = self.in_flight.lock().unwrap();
        *in_flight -= 1;
        if *in_flight == 0 {
            self.progress.finish("fetch");
        }
    }
}

fn canonicalize<P: AsRef<Path>>(path: P) -> Result<Utf8PathBuf> {
    Ok(Utf8PathBuf::try_from(dunce::canonicalize(path)?)?)
}

fn current_dir() -> Result<PathBuf> {
    Ok(std::env::current_dir()?)
}
