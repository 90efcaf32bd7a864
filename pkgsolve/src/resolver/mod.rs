// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use log::{info, log_enabled, trace};
use semver::Version;

pub use crate::resolver::assignment::{Assignment, AssignmentSet};
pub use crate::resolver::constraints::{Constraint, ConstraintSet};
pub use crate::resolver::types::{BoundVersion, Requirement, VersionRange, VersionSetSpecifier};

use crate::errors::ResolverError;
use crate::provider::{Container, ContainerProvider, Delegate};
use crate::resolver::cache::ContainerCache;
use crate::resolver::debugger::Debugger;
use crate::resolver::latch::ErrorLatch;
use crate::resolver::merger::merge_dependencies;
use crate::resolver::stream::AssignmentStream;
use crate::types::PackageId;

mod assignment;
mod cache;
mod constraints;
mod debugger;
mod latch;
mod merger;
mod stream;
mod subtree;
mod types;

const LOGNAME: &str = "pkgsolve::resolver";

/// A lazy sequence of candidate assignments.
pub(crate) type AssignmentIter = Box<dyn Iterator<Item = AssignmentSet>>;

/// Versions that must not be considered for particular packages.
pub(crate) type Exclusions = BTreeMap<PackageId, BTreeSet<Version>>;

/// State shared by every step of one resolution: the container cache, the
/// error latch, and the subtree memo. Cheap to clone into the lazy pipeline
/// closures and discarded when the resolution ends.
pub(crate) struct SearchCore {
    pub(crate) cache: Arc<ContainerCache>,
    pub(crate) latch: Arc<ErrorLatch>,
    pub(crate) memo: RefCell<HashMap<(PackageId, ConstraintSet), AssignmentStream>>,
    pub(crate) incomplete: bool,
    pub(crate) prefetch: bool,
}

/// The dependency resolver.
///
/// Given input constraints and pins, finds a complete and maximal assignment
/// of every transitively reachable package, or explains why none exists. The
/// search is a depth-first, lazy, backtracking walk over persistent
/// constraint sets; container fetching is the only part that runs off the
/// calling thread.
pub struct Resolver {
    pub(crate) cache: Arc<ContainerCache>,
    pub(crate) latch: Arc<ErrorLatch>,
    prefetch: bool,
}

impl Resolver {
    pub fn new(
        provider: Arc<dyn ContainerProvider>,
        delegate: Option<Arc<dyn Delegate>>,
        prefetch: bool,
        skip_update: bool,
    ) -> Resolver {
        Resolver {
            cache: Arc::new(ContainerCache::new(provider, delegate, skip_update)),
            latch: Arc::new(ErrorLatch::new()),
            prefetch,
        }
    }

    /// Resolves `dependencies` under `pins`, returning the chosen binding for
    /// every package in the order the search fixed them.
    ///
    /// On unsatisfiable input the returned
    /// [`ResolverError::Unsatisfiable`] carries the inputs minimized down to
    /// a smallest subset that still conflicts (unless minimizing ran out of
    /// its time budget, in which case the untrimmed inputs are reported).
    pub fn resolve(
        &self,
        dependencies: &[Constraint],
        pins: &[Constraint],
    ) -> Result<Vec<(PackageId, BoundVersion)>, ResolverError> {
        info!(
            target: LOGNAME,
            "resolving {} dependencies under {} pins",
            dependencies.len(),
            pins.len()
        );

        match self.resolve_assignment(dependencies, pins, false) {
            Ok(assignment) => {
                let mut bindings = Vec::with_capacity(assignment.len());
                for (_, entry) in assignment.iter() {
                    // Identity is late-bound: the container may only know its
                    // true identity once the binding is fixed.
                    let package = entry.container().updated_identifier(entry.binding())?;
                    bindings.push((package, entry.binding().clone()));
                }

                if log_enabled!(log::Level::Trace) {
                    trace!(target: LOGNAME, "solution found");
                    for (package, binding) in &bindings {
                        trace!(target: LOGNAME, "solution package: {} {}", package, binding);
                    }
                }
                Ok(bindings)
            }
            Err(ResolverError::Unsatisfiable { dependencies: d, pins: p }) => {
                info!(target: LOGNAME, "unsatisfiable; minimizing the inputs");
                match Debugger::new(self).debug(dependencies, pins) {
                    Ok((dependencies, pins)) => {
                        Err(ResolverError::Unsatisfiable { dependencies, pins })
                    }
                    Err(error) => {
                        trace!(target: LOGNAME, "could not minimize: {}", error);
                        Err(ResolverError::Unsatisfiable {
                            dependencies: d,
                            pins: p,
                        })
                    }
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Thread-safe; the search observes the cancellation at its next step
    /// and winds down with [`ResolverError::Cancelled`].
    pub fn cancel(&self) {
        info!(target: LOGNAME, "cancelling the resolution");
        self.latch.cancel();
    }

    /// A snapshot of every container fetched so far, for diagnostics.
    pub fn containers(&self) -> Vec<Arc<dyn Container>> {
        self.cache.snapshot()
    }

    /// One full search pass. In incomplete mode nothing new is fetched:
    /// dependencies whose containers were never cached are simply not
    /// descended into.
    pub(crate) fn resolve_assignment(
        &self,
        dependencies: &[Constraint],
        pins: &[Constraint],
        incomplete: bool,
    ) -> Result<AssignmentSet, ResolverError> {
        self.latch.reset();

        // Pins seed the constraint set. When two pins disagree the first one
        // merged wins and the rest are dropped.
        let mut seeded = ConstraintSet::new();
        for pin in pins {
            match seeded.merge(pin) {
                Some(merged) => seeded = merged,
                None => trace!(
                    target: LOGNAME,
                    "ignoring pin for {}; it conflicts with an earlier pin",
                    pin.package
                ),
            }
        }

        let core = Rc::new(SearchCore {
            cache: Arc::clone(&self.cache),
            latch: Arc::clone(&self.latch),
            memo: RefCell::new(HashMap::new()),
            incomplete,
            prefetch: self.prefetch && !incomplete,
        });

        let mut sequence = merge_dependencies(
            core,
            dependencies.to_vec(),
            AssignmentSet::new(),
            seeded,
            Rc::new(Exclusions::new()),
        );

        match sequence.next() {
            Some(assignment) => Ok(assignment),
            None => {
                if let Some(error) = self.latch.current() {
                    return Err(error);
                }
                let missing = self.diagnose_missing_versions(dependencies, incomplete)?;
                if !missing.is_empty() {
                    return Err(ResolverError::MissingVersions(missing));
                }
                Err(ResolverError::Unsatisfiable {
                    dependencies: dependencies.to_vec(),
                    pins: pins.to_vec(),
                })
            }
        }
    }

    /// Input constraints whose filtered version lists come up empty: these
    /// point at sources that simply do not carry anything acceptable, which
    /// is a better answer than a bare "unsatisfiable".
    fn diagnose_missing_versions(
        &self,
        dependencies: &[Constraint],
        incomplete: bool,
    ) -> Result<Vec<Constraint>, ResolverError> {
        let mut missing = Vec::new();
        for constraint in dependencies {
            let set = match &constraint.requirement {
                Requirement::VersionSet(set) => set,
                _ => continue,
            };
            let container = if incomplete {
                if !self.cache.contains(&constraint.package) {
                    continue;
                }
                match self.cache.get(&constraint.package) {
                    Ok(container) => container,
                    Err(_) => continue,
                }
            } else {
                self.cache.get(&constraint.package)?
            };

            let available = container.versions()?;
            let any_usable = available
                .iter()
                .any(|v| set.contains(v) && container.is_tools_version_compatible(v));
            if !any_usable {
                missing.push(constraint.clone());
            }
        }
        Ok(missing)
    }
}
