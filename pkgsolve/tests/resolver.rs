// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! End-to-end tests of the resolver against an in-memory provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use semver::Version;
use url::Url;

use pkgsolve::{
    BoundVersion, Constraint, Container, ContainerProvider, Delegate, PackageId, ProviderError,
    Requirement, Resolver, ResolverError, VersionRange, VersionSetSpecifier,
};

fn pkg(name: &str) -> PackageId {
    PackageId::new(name.parse().unwrap(), Url::parse("mock://registry").unwrap())
}

fn v(version: &str) -> Version {
    Version::parse(version).unwrap()
}

fn range(lower: &str, upper: &str) -> Requirement {
    Requirement::VersionSet(VersionSetSpecifier::Range(VersionRange::new(
        v(lower),
        Some(v(upper)),
    )))
}

fn dep(name: &str, lower: &str, upper: &str) -> Constraint {
    Constraint::new(pkg(name), range(lower, upper))
}

fn any_dep(name: &str) -> Constraint {
    Constraint::new(pkg(name), Requirement::any())
}

fn pin(name: &str, version: &str) -> Constraint {
    Constraint::new(pkg(name), Requirement::exact(v(version)))
}

fn bound(name: &str, version: &str) -> (PackageId, BoundVersion) {
    (pkg(name), BoundVersion::Version(v(version)))
}

#[derive(Default, Clone)]
struct MockPackage {
    versions: Vec<(Version, Vec<Constraint>)>,
    revisions: HashMap<String, Vec<Constraint>>,
    local: Vec<Constraint>,
    incompatible: Vec<Version>,
    updated_location: Option<Url>,
}

struct MockContainer {
    id: PackageId,
    package: MockPackage,
}

fn mock_error(message: &str) -> ProviderError {
    ProviderError::new(std::io::Error::new(std::io::ErrorKind::Other, message.to_string()))
}

impl Container for MockContainer {
    fn identifier(&self) -> &PackageId {
        &self.id
    }

    fn versions(&self) -> Result<Vec<Version>, ProviderError> {
        let mut versions: Vec<Version> =
            self.package.versions.iter().map(|(v, _)| v.clone()).collect();
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    fn is_tools_version_compatible(&self, version: &Version) -> bool {
        !self.package.incompatible.contains(version)
    }

    fn dependencies(&self, version: &Version) -> Result<Vec<Constraint>, ProviderError> {
        self.package
            .versions
            .iter()
            .find(|(declared, _)| declared == version)
            .map(|(_, deps)| deps.clone())
            .ok_or_else(|| mock_error("unknown version"))
    }

    fn revision_dependencies(&self, revision: &str) -> Result<Vec<Constraint>, ProviderError> {
        self.package
            .revisions
            .get(revision)
            .cloned()
            .ok_or_else(|| mock_error("unknown revision"))
    }

    fn unversioned_dependencies(&self) -> Result<Vec<Constraint>, ProviderError> {
        Ok(self.package.local.clone())
    }

    fn updated_identifier(&self, _binding: &BoundVersion) -> Result<PackageId, ProviderError> {
        match &self.package.updated_location {
            Some(url) => Ok(self.id.with_location(url.clone())),
            None => Ok(self.id.clone()),
        }
    }
}

#[derive(Default)]
struct MockProvider {
    packages: HashMap<PackageId, MockPackage>,
    fetches: Mutex<Vec<PackageId>>,
}

impl MockProvider {
    fn package(mut self, name: &str, versions: Vec<(&str, Vec<Constraint>)>) -> Self {
        let entry = self.packages.entry(pkg(name)).or_default();
        for (version, deps) in versions {
            entry.versions.push((v(version), deps));
        }
        self
    }

    fn revision(mut self, name: &str, revision: &str, deps: Vec<Constraint>) -> Self {
        self.packages
            .entry(pkg(name))
            .or_default()
            .revisions
            .insert(revision.to_string(), deps);
        self
    }

    fn local(mut self, name: &str, deps: Vec<Constraint>) -> Self {
        self.packages.entry(pkg(name)).or_default().local = deps;
        self
    }

    fn incompatible(mut self, name: &str, version: &str) -> Self {
        self.packages
            .entry(pkg(name))
            .or_default()
            .incompatible
            .push(v(version));
        self
    }

    fn relocated(mut self, name: &str, url: &str) -> Self {
        self.packages.entry(pkg(name)).or_default().updated_location =
            Some(Url::parse(url).unwrap());
        self
    }
}

impl ContainerProvider for MockProvider {
    fn get_container(
        &self,
        package: &PackageId,
        _skip_update: bool,
    ) -> Result<Arc<dyn Container>, ProviderError> {
        self.fetches.lock().unwrap().push(package.clone());
        match self.packages.get(package) {
            Some(data) => Ok(Arc::new(MockContainer {
                id: package.clone(),
                package: data.clone(),
            })),
            None => Err(mock_error("unknown package")),
        }
    }
}

fn resolver(provider: MockProvider) -> Resolver {
    Resolver::new(Arc::new(provider), None, false, false)
}

#[test]
fn resolves_a_single_package() {
    let resolver = resolver(MockProvider::default().package("a", vec![("1.0.0", vec![])]));

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]).unwrap();
    assert_eq!(result, vec![bound("a", "1.0.0")]);
}

#[test]
fn resolves_transitive_dependencies_in_discovery_order() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![dep("b", "2.0.0", "3.0.0")])])
        .package("b", vec![("2.0.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]).unwrap();
    assert_eq!(result, vec![bound("a", "1.0.0"), bound("b", "2.0.0")]);
}

#[test]
fn prefers_the_newest_acceptable_version() {
    let provider = MockProvider::default().package(
        "a",
        vec![("1.0.0", vec![]), ("1.0.1", vec![]), ("1.0.2", vec![])],
    );
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]).unwrap();
    assert_eq!(result, vec![bound("a", "1.0.2")]);
}

#[test]
fn backtracks_when_the_newest_version_cannot_work() {
    let provider = MockProvider::default()
        .package(
            "a",
            vec![
                ("1.0.0", vec![dep("c", "1.0.0", "2.0.0")]),
                ("2.0.0", vec![dep("c", "2.0.0", "3.0.0")]),
            ],
        )
        .package("c", vec![("1.5.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "3.0.0")], &[]).unwrap();
    assert_eq!(result, vec![bound("a", "1.0.0"), bound("c", "1.5.0")]);
}

#[test]
fn shared_dependencies_bind_once() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![dep("c", "1.0.0", "2.0.0")])])
        .package("b", vec![("1.0.0", vec![dep("c", "1.0.0", "2.0.0")])])
        .package("c", vec![("1.0.0", vec![]), ("1.1.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[any_dep("a"), any_dep("b")], &[]).unwrap();
    assert_eq!(
        result,
        vec![bound("a", "1.0.0"), bound("c", "1.1.0"), bound("b", "1.0.0")]
    );
}

#[test]
fn sibling_constraints_narrow_before_descent() {
    // b's constraint on c must already be in force when a's subtree picks a
    // version for c, otherwise a would grab c 2.0.0 and fail later.
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![dep("c", "1.0.0", "3.0.0")])])
        .package("b", vec![("1.0.0", vec![dep("c", "1.0.0", "2.0.0")])])
        .package("c", vec![("1.0.0", vec![]), ("2.0.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[any_dep("a"), any_dep("b")], &[]).unwrap();
    assert_eq!(
        result,
        vec![bound("a", "1.0.0"), bound("c", "1.0.0"), bound("b", "1.0.0")]
    );
}

#[test]
fn conflicting_requirements_are_minimized() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![dep("c", "1.0.0", "2.0.0")])])
        .package("b", vec![("1.0.0", vec![dep("c", "2.0.0", "3.0.0")])])
        .package("c", vec![("1.0.0", vec![]), ("2.0.0", vec![])])
        .package("noise", vec![("1.0.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[any_dep("noise"), any_dep("a"), any_dep("b")], &[]);
    match result {
        Err(ResolverError::Unsatisfiable { dependencies, pins }) => {
            // The innocent bystander is trimmed away.
            assert_eq!(dependencies, vec![any_dep("a"), any_dep("b")]);
            assert_eq!(pins, vec![]);
        }
        other => panic!("expected unsatisfiable, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn an_unsatisfiable_pin_is_reported_with_the_dependency() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![dep("b", "1.0.0", "2.0.0")])])
        .package("b", vec![("1.0.0", vec![]), ("2.0.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[pin("b", "2.0.0")]);
    match result {
        Err(ResolverError::Unsatisfiable { dependencies, pins }) => {
            assert_eq!(dependencies, vec![dep("a", "1.0.0", "2.0.0")]);
            assert_eq!(pins, vec![pin("b", "2.0.0")]);
        }
        other => panic!("expected unsatisfiable, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn a_satisfiable_pin_steers_the_choice() {
    let provider = MockProvider::default()
        .package("c", vec![("1.0.0", vec![]), ("1.1.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver
        .resolve(&[dep("c", "1.0.0", "2.0.0")], &[pin("c", "1.0.0")])
        .unwrap();
    assert_eq!(result, vec![bound("c", "1.0.0")]);
}

#[test]
fn conflicting_pins_prefer_the_first_merged() {
    let provider = MockProvider::default()
        .package("c", vec![("1.0.0", vec![]), ("1.1.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver
        .resolve(
            &[dep("c", "1.0.0", "2.0.0")],
            &[pin("c", "1.1.0"), pin("c", "1.0.0")],
        )
        .unwrap();
    assert_eq!(result, vec![bound("c", "1.1.0")]);
}

#[test]
fn a_direct_self_dependency_is_a_cycle() {
    let provider =
        MockProvider::default().package("a", vec![("1.0.0", vec![dep("a", "1.0.0", "2.0.0")])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]);
    match result {
        Err(ResolverError::Cycle(package)) => assert_eq!(package, pkg("a")),
        other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn a_versioned_package_may_not_depend_on_a_revision() {
    let provider = MockProvider::default()
        .package(
            "a",
            vec![(
                "1.0.0",
                vec![Constraint::new(
                    pkg("b"),
                    Requirement::Revision("abc123".into()),
                )],
            )],
        )
        .package("b", vec![("1.0.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]);
    match result {
        Err(ResolverError::IncompatibleConstraints {
            package,
            version,
            requirements,
        }) => {
            assert_eq!(package, pkg("a"));
            assert_eq!(version, "1.0.0");
            assert_eq!(requirements.len(), 1);
            assert_eq!(requirements[0].0, pkg("b"));
        }
        other => panic!("expected incompatible constraints, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn a_revision_may_not_reach_a_local_package() {
    let provider = MockProvider::default().revision(
        "a",
        "abc123",
        vec![Constraint::new(pkg("b"), Requirement::Unversioned)],
    );
    let resolver = resolver(provider);

    let result = resolver.resolve(
        &[Constraint::new(pkg("a"), Requirement::Revision("abc123".into()))],
        &[],
    );
    match result {
        Err(ResolverError::RevisionDependencyContainsLocalPackage { package, local }) => {
            assert_eq!(package, pkg("a"));
            assert_eq!(local, pkg("b"));
        }
        other => panic!("expected a revision/local conflict, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn revision_requirements_resolve_their_subtrees() {
    let provider = MockProvider::default()
        .revision("a", "abc123", vec![dep("b", "1.0.0", "2.0.0")])
        .package("b", vec![("1.2.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver
        .resolve(
            &[Constraint::new(pkg("a"), Requirement::Revision("abc123".into()))],
            &[],
        )
        .unwrap();
    assert_eq!(
        result,
        vec![
            (pkg("a"), BoundVersion::Revision("abc123".into())),
            bound("b", "1.2.0"),
        ]
    );
}

#[test]
fn unversioned_requirements_pull_local_dependencies() {
    let provider = MockProvider::default()
        .local("a", vec![dep("b", "1.0.0", "2.0.0")])
        .package("b", vec![("1.0.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver
        .resolve(&[Constraint::new(pkg("a"), Requirement::Unversioned)], &[])
        .unwrap();
    assert_eq!(
        result,
        vec![(pkg("a"), BoundVersion::Unversioned), bound("b", "1.0.0")]
    );
}

#[test]
fn unversioned_wins_over_a_version_requirement() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![])])
        .local("a", vec![]);
    let resolver = resolver(provider);

    let result = resolver
        .resolve(
            &[
                Constraint::new(pkg("a"), Requirement::Unversioned),
                dep("a", "1.0.0", "2.0.0"),
            ],
            &[],
        )
        .unwrap();
    assert_eq!(result, vec![(pkg("a"), BoundVersion::Unversioned)]);
}

#[test]
fn empty_filtered_versions_diagnose_as_missing() {
    let provider = MockProvider::default().package("a", vec![("3.0.0", vec![])]);
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]);
    match result {
        Err(ResolverError::MissingVersions(constraints)) => {
            assert_eq!(constraints, vec![dep("a", "1.0.0", "2.0.0")]);
        }
        other => panic!("expected missing versions, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn tools_incompatible_versions_are_skipped_silently() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![]), ("1.1.0", vec![])])
        .incompatible("a", "1.1.0");
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]).unwrap();
    assert_eq!(result, vec![bound("a", "1.0.0")]);
}

#[test]
fn provider_failures_surface_as_errors() {
    let resolver = resolver(MockProvider::default());

    let result = resolver.resolve(&[dep("ghost", "1.0.0", "2.0.0")], &[]);
    assert!(matches!(result, Err(ResolverError::Provider(_))));
}

#[test]
fn cancellation_wins_over_everything() {
    let provider = MockProvider::default().package("a", vec![("1.0.0", vec![])]);
    let resolver = resolver(provider);

    resolver.cancel();
    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]);
    assert!(matches!(result, Err(ResolverError::Cancelled)));
}

#[test]
fn resolution_is_deterministic() {
    let provider = MockProvider::default()
        .package(
            "a",
            vec![
                ("1.0.0", vec![dep("b", "1.0.0", "2.0.0")]),
                ("1.1.0", vec![dep("b", "1.0.0", "2.0.0")]),
            ],
        )
        .package("b", vec![("1.0.0", vec![]), ("1.5.0", vec![])]);

    let first = resolver(provider).resolve(&[any_dep("a")], &[]).unwrap();

    let provider = MockProvider::default()
        .package(
            "a",
            vec![
                ("1.0.0", vec![dep("b", "1.0.0", "2.0.0")]),
                ("1.1.0", vec![dep("b", "1.0.0", "2.0.0")]),
            ],
        )
        .package("b", vec![("1.0.0", vec![]), ("1.5.0", vec![])]);
    let second = resolver(provider).resolve(&[any_dep("a")], &[]).unwrap();

    assert_eq!(first, second);
    assert_eq!(first, vec![bound("a", "1.1.0"), bound("b", "1.5.0")]);
}

#[test]
fn each_container_is_fetched_once() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![dep("c", "1.0.0", "2.0.0")])])
        .package("b", vec![("1.0.0", vec![dep("c", "1.0.0", "2.0.0")])])
        .package("c", vec![("1.0.0", vec![])]);
    let provider = Arc::new(provider);
    let resolver = Resolver::new(
        Arc::clone(&provider) as Arc<dyn ContainerProvider>,
        None,
        false,
        false,
    );

    resolver.resolve(&[any_dep("a"), any_dep("b")], &[]).unwrap();

    let mut fetched: Vec<String> = provider
        .fetches
        .lock()
        .unwrap()
        .iter()
        .map(|id| id.name().to_string())
        .collect();
    fetched.sort();
    assert_eq!(fetched, vec!["a", "b", "c"]);
}

#[derive(Default)]
struct RecordingDelegate {
    events: Mutex<Vec<String>>,
}

impl Delegate for RecordingDelegate {
    fn fetching_container(&self, package: &PackageId) {
        self.events.lock().unwrap().push(format!("fetching {}", package));
    }

    fn fetched_container(&self, package: &PackageId) {
        self.events.lock().unwrap().push(format!("fetched {}", package));
    }
}

#[test]
fn prefetching_resolves_identically_and_notifies_the_delegate() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![dep("b", "1.0.0", "2.0.0")])])
        .package("b", vec![("1.0.0", vec![])]);
    let delegate = Arc::new(RecordingDelegate::default());
    let resolver = Resolver::new(
        Arc::new(provider),
        Some(Arc::clone(&delegate) as Arc<dyn Delegate>),
        true,
        false,
    );

    let result = resolver.resolve(&[any_dep("a")], &[]).unwrap();
    assert_eq!(result, vec![bound("a", "1.0.0"), bound("b", "1.0.0")]);

    let events = delegate.events.lock().unwrap();
    assert!(events.contains(&"fetching a".to_string()));
    assert!(events.contains(&"fetched b".to_string()));
}

#[test]
fn identities_are_late_bound() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![])])
        .relocated("a", "mock://mirror");
    let resolver = resolver(provider);

    let result = resolver.resolve(&[dep("a", "1.0.0", "2.0.0")], &[]).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0.location().as_str(), "mock://mirror");
    assert_eq!(result[0].1, BoundVersion::Version(v("1.0.0")));
}

#[test]
fn the_container_snapshot_reflects_the_search() {
    let provider = MockProvider::default()
        .package("a", vec![("1.0.0", vec![dep("b", "1.0.0", "2.0.0")])])
        .package("b", vec![("1.0.0", vec![])]);
    let resolver = resolver(provider);

    assert!(resolver.containers().is_empty());
    resolver.resolve(&[any_dep("a")], &[]).unwrap();

    let mut names: Vec<String> = resolver
        .containers()
        .iter()
        .map(|c| c.identifier().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
}
