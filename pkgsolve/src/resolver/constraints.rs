// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::collections::BTreeMap;
use std::fmt;

use crate::resolver::types::Requirement;
use crate::types::PackageId;

/// A single declared dependency: one package and what is acceptable for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub package: PackageId,
    pub requirement: Requirement,
}

impl Constraint {
    pub fn new(package: PackageId, requirement: Requirement) -> Constraint {
        Constraint {
            package,
            requirement,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.package, self.requirement)
    }
}

/// The set of requirements active for every package touched so far.
///
/// The map is persistent in the copy-on-write sense: every merge produces a
/// new set and the originals stay usable, which is what lets lazy search
/// branches share them freely. Packages that were never mentioned read as
/// unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConstraintSet {
    constraints: BTreeMap<PackageId, Requirement>,
}

impl ConstraintSet {
    pub fn new() -> ConstraintSet {
        ConstraintSet::default()
    }

    /// The active requirement for a package, `VersionSet(Any)` if none was
    /// ever merged.
    pub fn requirement(&self, package: &PackageId) -> Requirement {
        self.constraints
            .get(package)
            .cloned()
            .unwrap_or_else(Requirement::any)
    }

    pub fn contains(&self, package: &PackageId) -> bool {
        self.constraints.contains_key(package)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageId, &Requirement)> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Merges one constraint, returning the combined set, or `None` when the
    /// requirements are irreconcilable and the search branch must be
    /// abandoned.
    pub fn merge(&self, constraint: &Constraint) -> Option<ConstraintSet> {
        let current = self.requirement(&constraint.package);
        let merged = merge_requirements(&current, &constraint.requirement)?;

        let mut constraints = self.constraints.clone();
        constraints.insert(constraint.package.clone(), merged);
        Some(ConstraintSet { constraints })
    }

    pub fn merge_all(&self, constraints: &[Constraint]) -> Option<ConstraintSet> {
        let mut merged = self.clone();
        for constraint in constraints {
            merged = merged.merge(constraint)?;
        }
        Some(merged)
    }

    /// Pointwise merge of another whole set; fails if any single package
    /// fails to merge.
    pub fn merge_set(&self, other: &ConstraintSet) -> Option<ConstraintSet> {
        let mut merged = self.clone();
        for (package, requirement) in other.iter() {
            merged = merged.merge(&Constraint::new(package.clone(), requirement.clone()))?;
        }
        Some(merged)
    }
}

/// The merge table. Unversioned dominates everything; a revision is only
/// compatible with an unconstrained version set or the identical revision;
/// two version sets intersect and must not come out empty.
fn merge_requirements(current: &Requirement, new: &Requirement) -> Option<Requirement> {
    match (current, new) {
        (Requirement::VersionSet(a), Requirement::VersionSet(b)) => {
            let intersection = a.intersection(b);
            if intersection.is_empty() {
                None
            } else {
                Some(Requirement::VersionSet(intersection))
            }
        }
        (Requirement::VersionSet(set), Requirement::Revision(_)) => {
            if set.is_any() {
                Some(new.clone())
            } else {
                None
            }
        }
        (Requirement::VersionSet(_), Requirement::Unversioned) => Some(Requirement::Unversioned),
        (Requirement::Revision(_), Requirement::VersionSet(_)) => None,
        (Requirement::Revision(a), Requirement::Revision(b)) => {
            if a == b {
                Some(current.clone())
            } else {
                None
            }
        }
        (Requirement::Revision(_), Requirement::Unversioned) => Some(Requirement::Unversioned),
        (Requirement::Unversioned, _) => Some(Requirement::Unversioned),
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered: Vec<String> = self
            .constraints
            .iter()
            .map(|(package, requirement)| format!("{} ({})", package, requirement))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}
