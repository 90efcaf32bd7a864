// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::fmt;

use semver::{Prerelease, Version, VersionReq};

/// A half-open interval of versions, `[lower, upper)`. An absent upper bound
/// means the interval is unbounded above.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    lower: Version,
    upper: Option<Version>,
}

impl VersionRange {
    pub fn new(lower: Version, upper: Option<Version>) -> VersionRange {
        VersionRange { lower, upper }
    }

    pub fn lower(&self) -> &Version {
        &self.lower
    }

    pub fn upper(&self) -> Option<&Version> {
        self.upper.as_ref()
    }

    fn is_empty(&self) -> bool {
        match &self.upper {
            Some(upper) => *upper <= self.lower,
            None => false,
        }
    }

    fn contains(&self, version: &Version) -> bool {
        *version >= self.lower
            && match &self.upper {
                Some(upper) => version < upper,
                None => true,
            }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.upper {
            Some(upper) => write!(f, ">={}, <{}", self.lower, upper),
            None => write!(f, ">={}", self.lower),
        }
    }
}

/// A set of acceptable versions.
///
/// The common cases are kept explicit; `Ranges` carries any union that the
/// single-interval cases cannot represent, normalized so that equal sets
/// compare equal (required for subtree memoization).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSetSpecifier {
    /// No version is acceptable.
    Empty,
    /// Every version is acceptable.
    Any,
    /// Exactly one version is acceptable.
    Exact(Version),
    /// A single half-open interval of acceptable versions.
    Range(VersionRange),
    /// Two or more disjoint intervals, sorted ascending.
    Ranges(Vec<VersionRange>),
}

impl VersionSetSpecifier {
    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionSetSpecifier::Empty => false,
            VersionSetSpecifier::Any => true,
            VersionSetSpecifier::Exact(exact) => version == exact,
            VersionSetSpecifier::Range(range) => range.contains(version),
            VersionSetSpecifier::Ranges(ranges) => ranges.iter().any(|r| r.contains(version)),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, VersionSetSpecifier::Empty)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionSetSpecifier::Any)
    }

    pub fn intersection(&self, other: &VersionSetSpecifier) -> VersionSetSpecifier {
        match (self, other) {
            (VersionSetSpecifier::Any, other) => other.clone(),
            (this, VersionSetSpecifier::Any) => this.clone(),
            (VersionSetSpecifier::Empty, _) | (_, VersionSetSpecifier::Empty) => {
                VersionSetSpecifier::Empty
            }
            (this, other) => {
                let (a, b) = (this.to_ranges(), other.to_ranges());
                let mut out = Vec::new();
                let (mut i, mut j) = (0, 0);
                while i < a.len() && j < b.len() {
                    let lower = std::cmp::max(&a[i].lower, &b[j].lower).clone();
                    let upper = min_upper(&a[i].upper, &b[j].upper);
                    let range = VersionRange::new(lower, upper);
                    if !range.is_empty() {
                        out.push(range);
                    }
                    if upper_le(&a[i].upper, &b[j].upper) {
                        i += 1;
                    } else {
                        j += 1;
                    }
                }
                VersionSetSpecifier::from_ranges(out)
            }
        }
    }

    pub fn union(&self, other: &VersionSetSpecifier) -> VersionSetSpecifier {
        match (self, other) {
            (VersionSetSpecifier::Any, _) | (_, VersionSetSpecifier::Any) => {
                VersionSetSpecifier::Any
            }
            (VersionSetSpecifier::Empty, other) => other.clone(),
            (this, VersionSetSpecifier::Empty) => this.clone(),
            (this, other) => {
                let mut ranges = this.to_ranges();
                ranges.extend(other.to_ranges());
                VersionSetSpecifier::from_ranges(coalesce(ranges))
            }
        }
    }

    pub fn difference(&self, other: &VersionSetSpecifier) -> VersionSetSpecifier {
        match (self, other) {
            (VersionSetSpecifier::Empty, _) | (_, VersionSetSpecifier::Any) => {
                VersionSetSpecifier::Empty
            }
            (this, VersionSetSpecifier::Empty) => this.clone(),
            (this, other) => {
                let subtrahend = other.to_ranges();
                let mut out = Vec::new();
                for range in this.to_ranges() {
                    let mut remaining = vec![range];
                    for cut in &subtrahend {
                        let mut next = Vec::new();
                        for piece in remaining {
                            next.extend(subtract(piece, cut));
                        }
                        remaining = next;
                    }
                    out.extend(remaining);
                }
                VersionSetSpecifier::from_ranges(coalesce(out))
            }
        }
    }

    /// The canonical interval representation of this set. `Any` becomes the
    /// single interval starting at the absolute lowest version.
    fn to_ranges(&self) -> Vec<VersionRange> {
        match self {
            VersionSetSpecifier::Empty => Vec::new(),
            VersionSetSpecifier::Any => vec![VersionRange::new(lowest_version(), None)],
            VersionSetSpecifier::Exact(version) => vec![VersionRange::new(
                version.clone(),
                Some(strict_successor(version)),
            )],
            VersionSetSpecifier::Range(range) => vec![range.clone()],
            VersionSetSpecifier::Ranges(ranges) => ranges.clone(),
        }
    }

    /// Rebuilds the canonical case from a sorted, disjoint interval list.
    fn from_ranges(ranges: Vec<VersionRange>) -> VersionSetSpecifier {
        match ranges.len() {
            0 => VersionSetSpecifier::Empty,
            1 => {
                let range = ranges.into_iter().next().unwrap();
                if range.lower == lowest_version() && range.upper.is_none() {
                    VersionSetSpecifier::Any
                } else if range.upper == Some(strict_successor(&range.lower)) {
                    VersionSetSpecifier::Exact(range.lower)
                } else {
                    VersionSetSpecifier::Range(range)
                }
            }
            _ => VersionSetSpecifier::Ranges(ranges),
        }
    }
}

impl fmt::Display for VersionSetSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VersionSetSpecifier::Empty => write!(f, "empty"),
            VersionSetSpecifier::Any => write!(f, "*"),
            VersionSetSpecifier::Exact(version) => write!(f, "={}", version),
            VersionSetSpecifier::Range(range) => write!(f, "{}", range),
            VersionSetSpecifier::Ranges(ranges) => {
                let rendered: Vec<String> = ranges.iter().map(|r| r.to_string()).collect();
                write!(f, "{}", rendered.join(" || "))
            }
        }
    }
}

/// The absolute lowest version in semver order: the first prerelease of 0.0.0.
fn lowest_version() -> Version {
    let mut version = Version::new(0, 0, 0);
    version.pre = Prerelease::new("0").unwrap();
    version
}

/// The smallest version strictly greater than `version`. Appending the
/// numeric identifier `0` to a prerelease produces its immediate successor;
/// a release's successor is the first prerelease of the next patch.
fn strict_successor(version: &Version) -> Version {
    let mut next = if version.pre.is_empty() {
        Version::new(version.major, version.minor, version.patch + 1)
    } else {
        let mut v = Version::new(version.major, version.minor, version.patch);
        v.pre = Prerelease::new(&format!("{}.0", version.pre)).unwrap();
        return v;
    };
    next.pre = Prerelease::new("0").unwrap();
    next
}

fn min_upper(a: &Option<Version>, b: &Option<Version>) -> Option<Version> {
    match (a, b) {
        (Some(a), Some(b)) => Some(std::cmp::min(a, b).clone()),
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => None,
    }
}

fn upper_le(a: &Option<Version>, b: &Option<Version>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a <= b,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => true,
    }
}

/// Sorts and merges overlapping or adjacent intervals.
fn coalesce(mut ranges: Vec<VersionRange>) -> Vec<VersionRange> {
    ranges.retain(|r| !r.is_empty());
    ranges.sort_by(|a, b| a.lower.cmp(&b.lower));

    let mut out: Vec<VersionRange> = Vec::new();
    for range in ranges {
        match out.last_mut() {
            Some(last) if upper_reaches(&last.upper, &range.lower) => {
                if !upper_le(&range.upper, &last.upper) {
                    last.upper = range.upper;
                }
            }
            _ => out.push(range),
        }
    }
    out
}

fn upper_reaches(upper: &Option<Version>, lower: &Version) -> bool {
    match upper {
        Some(upper) => upper >= lower,
        None => true,
    }
}

/// `piece` minus `cut`, as zero, one, or two intervals.
fn subtract(piece: VersionRange, cut: &VersionRange) -> Vec<VersionRange> {
    let disjoint = match (&cut.upper, &piece.upper) {
        (Some(cut_upper), _) if *cut_upper <= piece.lower => true,
        _ => match &piece.upper {
            Some(piece_upper) => *piece_upper <= cut.lower,
            None => false,
        },
    };
    if disjoint {
        return vec![piece];
    }

    let mut out = Vec::new();
    if piece.lower < cut.lower {
        out.push(VersionRange::new(
            piece.lower.clone(),
            Some(cut.lower.clone()),
        ));
    }
    if let Some(cut_upper) = &cut.upper {
        let keeps_tail = match &piece.upper {
            Some(piece_upper) => cut_upper < piece_upper,
            None => true,
        };
        if keeps_tail {
            out.push(VersionRange::new(cut_upper.clone(), piece.upper));
        }
    }
    out.retain(|r| !r.is_empty());
    out
}

fn release(major: u64, minor: u64, patch: u64) -> Version {
    Version::new(major, minor, patch)
}

fn prerelease(major: u64, minor: u64, patch: u64, pre: &str) -> Version {
    let mut version = Version::new(major, minor, patch);
    version.pre = Prerelease::new(pre).unwrap();
    version
}

/// The first prerelease of a version, used as a synthesized exclusive upper
/// bound so that prereleases of the boundary itself stay outside the set.
fn boundary(major: u64, minor: u64, patch: u64) -> Version {
    prerelease(major, minor, patch, "0")
}

fn between(lower: Version, upper: Version) -> VersionSetSpecifier {
    VersionSetSpecifier::Range(VersionRange::new(lower, Some(upper)))
}

fn higher_than(lower: Version) -> VersionSetSpecifier {
    VersionSetSpecifier::Range(VersionRange::new(lower, None))
}

fn strictly_lower_than(upper: Version) -> VersionSetSpecifier {
    VersionSetSpecifier::Range(VersionRange::new(lowest_version(), Some(upper)))
}

impl From<&VersionReq> for VersionSetSpecifier {
    fn from(req: &VersionReq) -> VersionSetSpecifier {
        // An empty requirement ("*") accepts anything; otherwise every
        // comparator constrains the set further.
        let mut set = VersionSetSpecifier::Any;
        for comp in req.comparators.iter() {
            set = set.intersection(&convert(comp));
        }
        set
    }
}

impl From<VersionReq> for VersionSetSpecifier {
    fn from(req: VersionReq) -> VersionSetSpecifier {
        VersionSetSpecifier::from(&req)
    }
}

fn convert(comp: &semver::Comparator) -> VersionSetSpecifier {
    let major = comp.major;
    let comp_pre = if comp.pre.is_empty() {
        None
    } else {
        Some(comp.pre.as_str())
    };

    match comp.op {
        semver::Op::Exact => match (comp.minor, comp.patch, comp_pre) {
            // =I.J.K-P — exactly that prerelease
            (Some(minor), Some(patch), Some(pre)) => {
                VersionSetSpecifier::Exact(prerelease(major, minor, patch, pre))
            }
            // =I.J.K — exactly the version I.J.K
            (Some(minor), Some(patch), None) => {
                VersionSetSpecifier::Exact(release(major, minor, patch))
            }
            // =I.J — equivalent to >=I.J.0, <I.(J+1).0
            (Some(minor), None, None) => {
                between(release(major, minor, 0), boundary(major, minor + 1, 0))
            }
            // =I — equivalent to >=I.0.0, <(I+1).0.0
            (None, None, None) => between(release(major, 0, 0), boundary(major + 1, 0, 0)),
            _ => unreachable!(),
        },
        semver::Op::Greater => match (comp.minor, comp.patch, comp_pre) {
            // >I.J.K-P — the immediate successor of the prerelease onwards
            (Some(minor), Some(patch), Some(pre)) => {
                higher_than(strict_successor(&prerelease(major, minor, patch, pre)))
            }
            // >I.J.K — equivalent to >=I.J.(K+1)
            (Some(minor), Some(patch), None) => higher_than(release(major, minor, patch + 1)),
            // >I.J — equivalent to >=I.(J+1).0
            (Some(minor), None, None) => higher_than(release(major, minor + 1, 0)),
            // >I — equivalent to >=(I+1).0.0
            (None, None, None) => higher_than(release(major + 1, 0, 0)),
            _ => unreachable!(),
        },
        semver::Op::GreaterEq => match (comp.minor, comp.patch, comp_pre) {
            (Some(minor), Some(patch), Some(pre)) => {
                higher_than(prerelease(major, minor, patch, pre))
            }
            (Some(minor), Some(patch), None) => higher_than(release(major, minor, patch)),
            (Some(minor), None, None) => higher_than(release(major, minor, 0)),
            (None, None, None) => higher_than(release(major, 0, 0)),
            _ => unreachable!(),
        },
        semver::Op::Less => match (comp.minor, comp.patch, comp_pre) {
            (Some(minor), Some(patch), Some(pre)) => {
                strictly_lower_than(prerelease(major, minor, patch, pre))
            }
            (Some(minor), Some(patch), None) => strictly_lower_than(release(major, minor, patch)),
            // <I.J — nothing with that minor, not even its prereleases
            (Some(minor), None, None) => strictly_lower_than(boundary(major, minor, 0)),
            (None, None, None) => strictly_lower_than(boundary(major, 0, 0)),
            _ => unreachable!(),
        },
        semver::Op::LessEq => match (comp.minor, comp.patch, comp_pre) {
            // <=I.J.K-P — equivalent to <I.J.K-(P.0)
            (Some(minor), Some(patch), Some(pre)) => {
                strictly_lower_than(strict_successor(&prerelease(major, minor, patch, pre)))
            }
            // <=I.J.K — everything up to and including the release
            (Some(minor), Some(patch), None) => {
                strictly_lower_than(boundary(major, minor, patch + 1))
            }
            (Some(minor), None, None) => strictly_lower_than(boundary(major, minor + 1, 0)),
            (None, None, None) => strictly_lower_than(boundary(major + 1, 0, 0)),
            _ => unreachable!(),
        },
        semver::Op::Tilde => match (comp.minor, comp.patch, comp_pre) {
            // ~I.J.K-P — equivalent to >=I.J.K-P, <I.(J+1).0
            (Some(minor), Some(patch), Some(pre)) => between(
                prerelease(major, minor, patch, pre),
                boundary(major, minor + 1, 0),
            ),
            // ~I.J.K — equivalent to >=I.J.K, <I.(J+1).0
            (Some(minor), Some(patch), None) => {
                between(release(major, minor, patch), boundary(major, minor + 1, 0))
            }
            // ~I.J — equivalent to =I.J
            (Some(minor), None, None) => {
                between(release(major, minor, 0), boundary(major, minor + 1, 0))
            }
            // ~I — equivalent to =I
            (None, None, None) => between(release(major, 0, 0), boundary(major + 1, 0, 0)),
            _ => unreachable!(),
        },
        semver::Op::Caret => match (comp.minor, comp.patch, comp_pre) {
            (Some(minor), Some(patch), Some(pre)) => {
                if major > 0 {
                    // ^I.J.K-P (for I>0) — equivalent to >=I.J.K-P, <(I+1).0.0
                    between(
                        prerelease(major, minor, patch, pre),
                        boundary(major + 1, 0, 0),
                    )
                } else if minor > 0 {
                    // ^0.J.K-P (for J>0) — equivalent to >=0.J.K-P, <0.(J+1).0
                    between(prerelease(0, minor, patch, pre), boundary(0, minor + 1, 0))
                } else {
                    // ^0.0.K-P — equivalent to >=0.0.K-P, <0.0.(K+1)
                    between(prerelease(0, 0, patch, pre), boundary(0, 0, patch + 1))
                }
            }
            (Some(minor), Some(patch), None) => {
                if major > 0 {
                    // ^I.J.K (for I>0) — equivalent to >=I.J.K, <(I+1).0.0
                    between(release(major, minor, patch), boundary(major + 1, 0, 0))
                } else if minor > 0 {
                    // ^0.J.K (for J>0) — equivalent to >=0.J.K, <0.(J+1).0
                    between(release(0, minor, patch), boundary(0, minor + 1, 0))
                } else {
                    // ^0.0.K — equivalent to =0.0.K
                    VersionSetSpecifier::Exact(release(0, 0, patch))
                }
            }
            (Some(minor), None, None) => {
                if major > 0 {
                    between(release(major, minor, 0), boundary(major + 1, 0, 0))
                } else if minor > 0 {
                    // ^0.J — equivalent to >=0.J.0, <0.(J+1).0
                    between(release(0, minor, 0), boundary(0, minor + 1, 0))
                } else {
                    // ^0.0 — equivalent to =0.0
                    between(release(0, 0, 0), boundary(0, 1, 0))
                }
            }
            // ^I — equivalent to =I
            (None, None, None) => between(release(major, 0, 0), boundary(major + 1, 0, 0)),
            _ => unreachable!(),
        },
        semver::Op::Wildcard => match (comp.minor, comp.patch) {
            (Some(_), Some(_)) => unreachable!(),
            // I.J.* — equivalent to =I.J
            (Some(minor), None) => between(release(major, minor, 0), boundary(major, minor + 1, 0)),
            // I.* or I.*.* — equivalent to =I
            (None, None) => between(release(major, 0, 0), boundary(major + 1, 0, 0)),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn range(lower: Version, upper: Version) -> VersionSetSpecifier {
        between(lower, upper)
    }

    fn req(s: &str) -> VersionSetSpecifier {
        VersionSetSpecifier::from(&s.parse::<VersionReq>().unwrap())
    }

    #[test]
    fn intersection_identity_and_zero() {
        let set = range(release(1, 0, 0), release(2, 0, 0));

        assert_eq!(set.intersection(&VersionSetSpecifier::Any), set);
        assert_eq!(VersionSetSpecifier::Any.intersection(&set), set);
        assert_eq!(
            set.intersection(&VersionSetSpecifier::Empty),
            VersionSetSpecifier::Empty
        );
        assert_eq!(
            VersionSetSpecifier::Empty.intersection(&set),
            VersionSetSpecifier::Empty
        );
    }

    #[test]
    fn intersection_is_commutative_and_idempotent() {
        let a = range(release(1, 0, 0), release(3, 0, 0));
        let b = range(release(2, 0, 0), release(4, 0, 0));

        assert_eq!(a.intersection(&b), b.intersection(&a));
        assert_eq!(a.intersection(&a), a);
        assert_eq!(
            a.intersection(&b),
            range(release(2, 0, 0), release(3, 0, 0))
        );
    }

    #[test]
    fn intersection_is_associative() {
        let a = range(release(1, 0, 0), release(5, 0, 0));
        let b = range(release(2, 0, 0), release(6, 0, 0));
        let c = range(release(3, 0, 0), release(7, 0, 0));

        assert_eq!(
            a.intersection(&b).intersection(&c),
            a.intersection(&b.intersection(&c))
        );
    }

    #[test]
    fn disjoint_ranges_intersect_to_empty() {
        let a = range(release(1, 0, 0), release(2, 0, 0));
        let b = range(release(2, 0, 0), release(3, 0, 0));

        assert_eq!(a.intersection(&b), VersionSetSpecifier::Empty);
    }

    #[test]
    fn exact_intersects_containing_range() {
        let exact = VersionSetSpecifier::Exact(release(1, 5, 0));
        let a = range(release(1, 0, 0), release(2, 0, 0));

        assert_eq!(a.intersection(&exact), exact);
        assert_eq!(
            exact.intersection(&range(release(2, 0, 0), release(3, 0, 0))),
            VersionSetSpecifier::Empty
        );
    }

    #[test]
    fn union_merges_adjacent_ranges() {
        let a = range(release(1, 0, 0), release(2, 0, 0));
        let b = range(release(2, 0, 0), release(3, 0, 0));

        assert_eq!(a.union(&b), range(release(1, 0, 0), release(3, 0, 0)));
    }

    #[test]
    fn union_keeps_disjoint_ranges_apart() {
        let a = range(release(1, 0, 0), release(2, 0, 0));
        let b = range(release(4, 0, 0), release(5, 0, 0));
        let union = a.union(&b);

        assert!(union.contains(&release(1, 5, 0)));
        assert!(!union.contains(&release(3, 0, 0)));
        assert!(union.contains(&release(4, 2, 0)));
        assert_eq!(union.union(&a), union);
    }

    #[test]
    fn difference_punches_holes() {
        let a = range(release(1, 0, 0), release(4, 0, 0));
        let b = range(release(2, 0, 0), release(3, 0, 0));
        let diff = a.difference(&b);

        assert!(diff.contains(&release(1, 5, 0)));
        assert!(!diff.contains(&release(2, 5, 0)));
        assert!(diff.contains(&release(3, 5, 0)));
        assert_eq!(a.difference(&VersionSetSpecifier::Any), VersionSetSpecifier::Empty);
        assert_eq!(a.difference(&VersionSetSpecifier::Empty), a);
    }

    #[test]
    fn any_minus_range_is_still_unbounded() {
        let cut = range(release(1, 0, 0), release(2, 0, 0));
        let diff = VersionSetSpecifier::Any.difference(&cut);

        assert!(diff.contains(&release(0, 5, 0)));
        assert!(!diff.contains(&release(1, 5, 0)));
        assert!(diff.contains(&release(99, 0, 0)));
    }

    #[test]
    fn prereleases_sort_below_their_release() {
        let set = range(release(1, 0, 0), release(2, 0, 0));

        assert!(set.contains(&prerelease(1, 5, 0, "alpha")));
        assert!(!set.contains(&prerelease(1, 0, 0, "alpha")));
    }

    #[test]
    fn caret_requirement_converts_to_range() {
        let set = req("^1.2.3");

        assert!(set.contains(&release(1, 2, 3)));
        assert!(set.contains(&release(1, 9, 0)));
        assert!(!set.contains(&release(2, 0, 0)));
        assert!(!set.contains(&prerelease(2, 0, 0, "alpha")));
        assert!(!set.contains(&release(1, 2, 2)));
    }

    #[test]
    fn compound_requirement_intersects_comparators() {
        let set = req(">=1.0.0, <2.0.0");

        assert!(set.contains(&release(1, 0, 0)));
        assert!(set.contains(&release(1, 9, 9)));
        assert!(!set.contains(&release(2, 0, 0)));
    }

    #[test]
    fn wildcard_requirement_accepts_anything() {
        assert_eq!(req("*"), VersionSetSpecifier::Any);
    }

    #[test]
    fn exact_round_trips_through_interval_form() {
        let exact = VersionSetSpecifier::Exact(release(1, 2, 3));

        assert_eq!(exact.intersection(&VersionSetSpecifier::Any), exact);
        assert_eq!(exact.union(&VersionSetSpecifier::Empty), exact);
    }
}
