// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::iter;
use std::rc::Rc;
use std::sync::Arc;

use log::{log_enabled, trace};
use semver::Version;

use crate::errors::ResolverError;
use crate::provider::Container;
use crate::resolver::assignment::AssignmentSet;
use crate::resolver::constraints::{Constraint, ConstraintSet};
use crate::resolver::merger::merge_dependencies;
use crate::resolver::stream::AssignmentStream;
use crate::resolver::types::{BoundVersion, Requirement};
use crate::resolver::{AssignmentIter, Exclusions, SearchCore};
use crate::types::PackageId;

const LOGNAME: &str = "pkgsolve::resolver";

/// Lazily enumerates every assignment that satisfies `constraints` with the
/// given container at its root.
///
/// Results are memoized per `(package, constraints)` pair so that a subtree
/// reached along several search paths is only solved once; the memo is
/// bypassed whenever version exclusions are in play, since they change the
/// answer without appearing in the key.
pub(crate) fn resolve_subtree(
    core: Rc<SearchCore>,
    container: Arc<dyn Container>,
    constraints: ConstraintSet,
    exclusions: Rc<Exclusions>,
) -> AssignmentIter {
    if !exclusions.is_empty() {
        return deferred(core, container, constraints, exclusions);
    }

    let key = (container.identifier().clone(), constraints.clone());
    if let Some(stream) = core.memo.borrow().get(&key) {
        trace!(target: LOGNAME, "reusing solved subtree for {}", key.0);
        return Box::new(stream.iter());
    }

    let stream = AssignmentStream::new(deferred(
        Rc::clone(&core),
        container,
        constraints,
        exclusions,
    ));
    core.memo.borrow_mut().insert(key, stream.clone());
    Box::new(stream.iter())
}

/// Wraps the subtree construction so nothing happens until the first pull.
fn deferred(
    core: Rc<SearchCore>,
    container: Arc<dyn Container>,
    constraints: ConstraintSet,
    exclusions: Rc<Exclusions>,
) -> AssignmentIter {
    Box::new(iter::once(()).flat_map(move |_| {
        subtree(
            Rc::clone(&core),
            Arc::clone(&container),
            constraints.clone(),
            Rc::clone(&exclusions),
        )
    }))
}

fn subtree(
    core: Rc<SearchCore>,
    container: Arc<dyn Container>,
    constraints: ConstraintSet,
    exclusions: Rc<Exclusions>,
) -> AssignmentIter {
    if core.latch.is_set() {
        return Box::new(iter::empty());
    }

    let package = container.identifier().clone();
    match constraints.requirement(&package) {
        Requirement::Unversioned => {
            let dependencies = match container.unversioned_dependencies() {
                Ok(dependencies) => dependencies,
                Err(error) => return latched(&core, error.into()),
            };
            if let Some(error) = cycle(&package, &dependencies) {
                return latched(&core, error);
            }

            let seed = AssignmentSet::new().bind(Arc::clone(&container), BoundVersion::Unversioned);
            merge_dependencies(core, dependencies, seed, constraints, exclusions)
        }
        Requirement::Revision(revision) => {
            let dependencies = match container.revision_dependencies(&revision) {
                Ok(dependencies) => dependencies,
                Err(error) => return latched(&core, error.into()),
            };
            // A revision is reproducible; depending on someone's working
            // copy from it would not be.
            if let Some(local) = dependencies
                .iter()
                .find(|d| d.requirement == Requirement::Unversioned)
            {
                return latched(
                    &core,
                    ResolverError::RevisionDependencyContainsLocalPackage {
                        package,
                        local: local.package.clone(),
                    },
                );
            }
            if let Some(error) = cycle(&package, &dependencies) {
                return latched(&core, error);
            }

            let seed = AssignmentSet::new().bind(
                Arc::clone(&container),
                BoundVersion::Revision(revision.clone()),
            );
            merge_dependencies(core, dependencies, seed, constraints, exclusions)
        }
        Requirement::VersionSet(set) => {
            let available = match container.versions() {
                Ok(available) => available,
                Err(error) => return latched(&core, error.into()),
            };
            let excluded = exclusions.get(&package).cloned().unwrap_or_default();
            let candidates: Vec<Version> = available
                .into_iter()
                .filter(|version| {
                    set.contains(version)
                        && !excluded.contains(version)
                        && container.is_tools_version_compatible(version)
                })
                .collect();

            if log_enabled!(log::Level::Trace) {
                let versions_str: Vec<String> =
                    candidates.iter().map(|v| v.to_string()).collect();
                trace!(
                    target: LOGNAME,
                    "candidate versions for {}: [{}]",
                    package,
                    versions_str.join(", ")
                );
            }

            let mut previous: Option<Version> = None;
            Box::new(candidates.into_iter().flat_map(move |version| {
                // The provider promised newest first.
                if let Some(previous) = &previous {
                    debug_assert!(previous > &version);
                }
                previous = Some(version.clone());

                if core.latch.is_set() {
                    return Box::new(iter::empty()) as AssignmentIter;
                }

                let dependencies = match container.dependencies(&version) {
                    Ok(dependencies) => dependencies,
                    Err(error) => return latched(&core, error.into()),
                };
                let dependencies: Vec<Constraint> = if core.incomplete {
                    dependencies
                        .into_iter()
                        .filter(|d| core.cache.contains(&d.package))
                        .collect()
                } else {
                    dependencies
                };

                // A released version may only depend on released versions.
                let offending: Vec<&Constraint> = dependencies
                    .iter()
                    .filter(|d| !d.requirement.is_versioned())
                    .collect();
                if !offending.is_empty() {
                    let requirements = offending
                        .iter()
                        .map(|d| (d.package.clone(), d.requirement.to_string()))
                        .collect();
                    return latched(
                        &core,
                        ResolverError::IncompatibleConstraints {
                            package: package.clone(),
                            version: version.to_string(),
                            requirements,
                        },
                    );
                }
                if let Some(error) = cycle(&package, &dependencies) {
                    return latched(&core, error);
                }

                let seed = AssignmentSet::new().bind(
                    Arc::clone(&container),
                    BoundVersion::Version(version.clone()),
                );
                merge_dependencies(
                    Rc::clone(&core),
                    dependencies,
                    seed,
                    constraints.clone(),
                    Rc::clone(&exclusions),
                )
            }))
        }
    }
}

/// Only a direct self-reference is treated as a cycle here; transitive ones
/// merge-fail against the assignment already holding the package and
/// backtrack naturally.
fn cycle(package: &PackageId, dependencies: &[Constraint]) -> Option<ResolverError> {
    if dependencies.iter().any(|d| d.package == *package) {
        Some(ResolverError::Cycle(package.clone()))
    } else {
        None
    }
}

fn latched(core: &Rc<SearchCore>, error: ResolverError) -> AssignmentIter {
    core.latch.set(error);
    Box::new(iter::empty())
}
