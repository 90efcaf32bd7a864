// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::time::{Duration, Instant};

use log::trace;

use crate::errors::ResolverError;
use crate::resolver::constraints::Constraint;
use crate::resolver::types::Requirement;
use crate::resolver::Resolver;

const LOGNAME: &str = "pkgsolve::resolver";

/// How long the minimization may run before the untrimmed failure is
/// reported instead.
const TIME_BUDGET: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Dependency(Constraint),
    Pin(Constraint),
}

/// Narrows a failing `(dependencies, pins)` input down to a smallest subset
/// that still fails, using the classic ddmin recursion over "allow this
/// input" changes.
///
/// Every trial re-runs the resolver in incomplete mode, against the
/// containers the failed resolution already fetched and never the network,
/// with the disallowed dependencies forced out of the search by synthesized
/// unversioned constraints.
pub(crate) struct Debugger<'r> {
    resolver: &'r Resolver,
    deadline: Instant,
}

impl<'r> Debugger<'r> {
    pub(crate) fn new(resolver: &'r Resolver) -> Debugger<'r> {
        Debugger {
            resolver,
            deadline: Instant::now() + TIME_BUDGET,
        }
    }

    pub(crate) fn debug(
        &self,
        dependencies: &[Constraint],
        pins: &[Constraint],
    ) -> Result<(Vec<Constraint>, Vec<Constraint>), ResolverError> {
        let mut changes: Vec<Change> = dependencies
            .iter()
            .cloned()
            .map(Change::Dependency)
            .collect();
        changes.extend(pins.iter().cloned().map(Change::Pin));

        let minimal = ddmin(&changes, |allowed| self.still_fails(allowed, dependencies))?;
        trace!(
            target: LOGNAME,
            "minimized {} inputs down to {}",
            changes.len(),
            minimal.len()
        );

        let mut minimal_dependencies = Vec::new();
        let mut minimal_pins = Vec::new();
        for change in minimal {
            match change {
                Change::Dependency(constraint) => minimal_dependencies.push(constraint),
                Change::Pin(constraint) => minimal_pins.push(constraint),
            }
        }
        Ok((minimal_dependencies, minimal_pins))
    }

    /// The ddmin predicate: does the problem still fail with only these
    /// inputs allowed?
    fn still_fails(
        &self,
        allowed: &[Change],
        dependencies: &[Constraint],
    ) -> Result<bool, ResolverError> {
        if self.resolver.latch.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(ResolverError::DebuggerTimeout);
        }

        let allowed_dependencies: Vec<Constraint> = allowed
            .iter()
            .filter_map(|change| match change {
                Change::Dependency(constraint) => Some(constraint.clone()),
                Change::Pin(_) => None,
            })
            .collect();
        let allowed_pins: Vec<Constraint> = allowed
            .iter()
            .filter_map(|change| match change {
                Change::Pin(constraint) => Some(constraint.clone()),
                Change::Dependency(_) => None,
            })
            .collect();
        let disallowed: Vec<&Constraint> = dependencies
            .iter()
            .filter(|d| !allowed_dependencies.contains(d))
            .collect();

        // A pin on a package that was forced out can never hold; such a
        // trial tells us nothing.
        if allowed_pins
            .iter()
            .any(|pin| disallowed.iter().any(|d| d.package == pin.package))
        {
            return Ok(false);
        }

        let mut constraints = allowed_dependencies;
        constraints.extend(
            disallowed
                .iter()
                .map(|d| Constraint::new(d.package.clone(), Requirement::Unversioned)),
        );

        match self
            .resolver
            .resolve_assignment(&constraints, &allowed_pins, true)
        {
            Err(ResolverError::Unsatisfiable { .. }) => Ok(true),
            Err(ResolverError::Cancelled) => Err(ResolverError::Cancelled),
            Ok(_) | Err(_) => Ok(false),
        }
    }
}

/// Zeller's ddmin over an arbitrary item list. Finds a small (1-minimal in
/// the limit) subset for which the predicate holds, assuming it holds for
/// the full list.
fn ddmin<T, F>(items: &[T], mut predicate: F) -> Result<Vec<T>, ResolverError>
where
    T: Clone,
    F: FnMut(&[T]) -> Result<bool, ResolverError>,
{
    let mut current: Vec<usize> = (0..items.len()).collect();
    let mut granularity = 2usize;

    while current.len() >= 2 {
        let chunk = (current.len() + granularity - 1) / granularity;
        let subsets: Vec<Vec<usize>> = current.chunks(chunk).map(|c| c.to_vec()).collect();

        let mut reduced: Option<(Vec<usize>, usize)> = None;
        for subset in &subsets {
            if predicate(&select(items, subset))? {
                reduced = Some((subset.clone(), 2));
                break;
            }
        }

        // For granularity two the complements are the other subsets, so only
        // test them beyond that.
        if reduced.is_none() && granularity > 2 {
            for subset in &subsets {
                let complement: Vec<usize> = current
                    .iter()
                    .copied()
                    .filter(|index| !subset.contains(index))
                    .collect();
                if complement.is_empty() {
                    continue;
                }
                if predicate(&select(items, &complement))? {
                    reduced = Some((complement, std::cmp::max(granularity - 1, 2)));
                    break;
                }
            }
        }

        match reduced {
            Some((next, next_granularity)) => {
                current = next;
                granularity = next_granularity;
            }
            None if granularity < current.len() => {
                granularity = std::cmp::min(granularity * 2, current.len());
            }
            None => break,
        }
    }

    Ok(select(items, &current))
}

fn select<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&index| items[index].clone()).collect()
}
