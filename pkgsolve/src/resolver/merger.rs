// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::iter;
use std::rc::Rc;
use std::sync::Arc;

use crate::resolver::assignment::AssignmentSet;
use crate::resolver::constraints::{Constraint, ConstraintSet};
use crate::resolver::subtree::resolve_subtree;
use crate::resolver::{AssignmentIter, Exclusions, SearchCore};

/// Extends `seed` with a consistent assignment for every dependency.
///
/// The fold over the dependency list is eager (containers are obtained and
/// the iterator pipeline is built up front, which is what lets prefetching
/// overlap the search), but each step of the pipeline is lazy: no subtree is
/// solved until something downstream pulls on the sequence. Dependencies are
/// visited in declared order and each subtree enumerates newest first, so
/// the first assignment out is the maximal one.
pub(crate) fn merge_dependencies(
    core: Rc<SearchCore>,
    dependencies: Vec<Constraint>,
    seed: AssignmentSet,
    constraints: ConstraintSet,
    exclusions: Rc<Exclusions>,
) -> AssignmentIter {
    // Every sibling requirement narrows the active set before any child is
    // descended into; a conflict here kills the whole branch at once.
    let constraints = match constraints.merge_all(&dependencies) {
        Some(constraints) => constraints,
        None => return Box::new(iter::empty()),
    };

    if core.prefetch {
        core.cache
            .prefetch(dependencies.iter().map(|d| d.package.clone()));
    }

    let mut sequence: Box<dyn Iterator<Item = (AssignmentSet, ConstraintSet)>> =
        Box::new(iter::once((seed, constraints)));

    for dependency in dependencies {
        if core.incomplete && !core.cache.contains(&dependency.package) {
            continue;
        }
        let container = match core.cache.get(&dependency.package) {
            Ok(container) => container,
            Err(error) => {
                core.latch.set(error.into());
                return Box::new(iter::empty());
            }
        };

        let step_core = Rc::clone(&core);
        let step_exclusions = Rc::clone(&exclusions);
        sequence = Box::new(sequence.flat_map(move |(assignment, active)| {
            if step_core.latch.is_set() {
                return Box::new(iter::empty())
                    as Box<dyn Iterator<Item = (AssignmentSet, ConstraintSet)>>;
            }

            let merge_core = Rc::clone(&step_core);
            let subtrees = resolve_subtree(
                Rc::clone(&step_core),
                Arc::clone(&container),
                active.clone(),
                Rc::clone(&step_exclusions),
            );
            Box::new(subtrees.filter_map(move |subtree| {
                // The two sides must agree on every shared package, and the
                // subtree's induced constraints must still fit the active
                // set; otherwise this combination is dead.
                let merged = assignment.merge(&subtree)?;
                let induced = match subtree.induced_constraints() {
                    Ok(induced) => induced,
                    Err(error) => {
                        merge_core.latch.set(error.into());
                        return None;
                    }
                };
                let narrowed = active.merge_set(&induced)?;
                Some((merged, narrowed))
            }))
        }));
    }

    Box::new(sequence.map(|(assignment, _)| assignment))
}
