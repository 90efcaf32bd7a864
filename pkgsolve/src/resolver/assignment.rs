// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::errors::ProviderError;
use crate::provider::Container;
use crate::resolver::constraints::ConstraintSet;
use crate::resolver::types::{BoundVersion, Requirement};
use crate::types::PackageId;

/// A consistent, insertion-ordered binding of packages to concrete outcomes.
///
/// Like [`ConstraintSet`] this is persistent: `bind` and `merge` return new
/// sets and never disturb the original, so lazy search branches can share
/// them. The insertion order is the order in which the depth-first search
/// fixed each package, and it is what makes the final output deterministic.
#[derive(Clone, Default)]
pub struct AssignmentSet {
    assignments: IndexMap<PackageId, Assignment>,
}

#[derive(Clone)]
pub struct Assignment {
    container: Arc<dyn Container>,
    binding: BoundVersion,
}

impl Assignment {
    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    pub fn binding(&self) -> &BoundVersion {
        &self.binding
    }
}

impl AssignmentSet {
    pub fn new() -> AssignmentSet {
        AssignmentSet::default()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn binding(&self, package: &PackageId) -> Option<&BoundVersion> {
        self.assignments.get(package).map(|a| &a.binding)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageId, &Assignment)> {
        self.assignments.iter()
    }

    /// The bindings in insertion order, without the containers.
    pub fn bindings(&self) -> Vec<(PackageId, BoundVersion)> {
        self.assignments
            .iter()
            .map(|(package, assignment)| (package.clone(), assignment.binding.clone()))
            .collect()
    }

    /// Returns a new set with the container bound. Rebinding a package
    /// replaces its previous binding.
    pub fn bind(&self, container: Arc<dyn Container>, binding: BoundVersion) -> AssignmentSet {
        let mut assignments = self.assignments.clone();
        assignments.insert(
            container.identifier().clone(),
            Assignment { container, binding },
        );
        AssignmentSet { assignments }
    }

    /// The constraints this assignment imposes: the declared dependencies of
    /// every version- or revision-bound entry, merged pointwise. Excluded and
    /// unversioned entries contribute nothing here; an unversioned entry's
    /// own dependencies are walked during its subtree search instead.
    pub fn induced_constraints(&self) -> Result<ConstraintSet, ProviderError> {
        let mut constraints = ConstraintSet::new();
        for assignment in self.assignments.values() {
            let contributed = match &assignment.binding {
                BoundVersion::Excluded | BoundVersion::Unversioned => continue,
                BoundVersion::Version(version) => assignment.container.dependencies(version)?,
                BoundVersion::Revision(revision) => {
                    assignment.container.revision_dependencies(revision)?
                }
            };
            constraints = constraints.merge_all(&contributed).unwrap_or_else(|| {
                unreachable!("assignment set induced an unsatisfiable constraint set")
            });
        }
        Ok(constraints)
    }

    /// Whether a binding for this container would be consistent with what the
    /// rest of the set demands.
    pub fn is_valid(
        &self,
        binding: &BoundVersion,
        container: &dyn Container,
    ) -> Result<bool, ProviderError> {
        let requirement = self
            .induced_constraints()?
            .requirement(container.identifier());
        Ok(match binding {
            BoundVersion::Unversioned => true,
            BoundVersion::Excluded => requirement == Requirement::any(),
            BoundVersion::Version(version) => match requirement {
                Requirement::VersionSet(set) => set.contains(version),
                _ => false,
            },
            BoundVersion::Revision(revision) => match requirement {
                Requirement::VersionSet(set) => set.is_any(),
                Requirement::Revision(required) => required == *revision,
                Requirement::Unversioned => false,
            },
        })
    }

    /// A set is complete when every package its induced constraints mention
    /// has a non-excluded entry.
    pub fn is_complete(&self) -> Result<bool, ProviderError> {
        let constraints = self.induced_constraints()?;
        let result = constraints.iter().all(|(package, _)| {
            !matches!(
                self.binding(package),
                None | Some(BoundVersion::Excluded)
            )
        });
        Ok(result)
    }

    /// Combines two assignments, requiring them to agree on every shared
    /// package. Constraint compatibility is the caller's concern; see the
    /// merge step of the solver.
    pub fn merge(&self, other: &AssignmentSet) -> Option<AssignmentSet> {
        let mut merged = self.clone();
        for (package, assignment) in other.iter() {
            match merged.binding(package) {
                Some(existing) if existing != &assignment.binding => return None,
                Some(_) => {}
                None => {
                    merged
                        .assignments
                        .insert(package.clone(), assignment.clone());
                }
            }
        }
        Some(merged)
    }
}

impl PartialEq for AssignmentSet {
    fn eq(&self, other: &Self) -> bool {
        self.bindings() == other.bindings()
    }
}

impl Eq for AssignmentSet {}

impl fmt::Debug for AssignmentSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(
                self.assignments
                    .iter()
                    .map(|(package, assignment)| (package.to_string(), assignment.binding.clone())),
            )
            .finish()
    }
}

impl fmt::Display for AssignmentSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered: Vec<String> = self
            .assignments
            .iter()
            .map(|(package, assignment)| format!("{} {}", package, assignment.binding))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}
