// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::trace;

use crate::errors::ProviderError;
use crate::provider::{Container, ContainerProvider, Delegate};
use crate::types::PackageId;

const LOGNAME: &str = "pkgsolve::resolver";

#[derive(Default)]
struct CacheState {
    containers: HashMap<PackageId, Result<Arc<dyn Container>, ProviderError>>,
    prefetching: HashSet<PackageId>,
}

/// Memoizes container fetches for the lifetime of a resolver.
///
/// The search thread calls `get`; prefetching spawns background fetches whose
/// completions land in the same map. Everything moves under one mutex, and a
/// condvar lets `get` park while a prefetch for the same package is in
/// flight. Fetch errors are cached too, and rethrown to every later caller.
pub(crate) struct ContainerCache {
    provider: Arc<dyn ContainerProvider>,
    delegate: Option<Arc<dyn Delegate>>,
    skip_update: bool,
    state: Mutex<CacheState>,
    fetched: Condvar,
}

impl ContainerCache {
    pub(crate) fn new(
        provider: Arc<dyn ContainerProvider>,
        delegate: Option<Arc<dyn Delegate>>,
        skip_update: bool,
    ) -> ContainerCache {
        ContainerCache {
            provider,
            delegate,
            skip_update,
            state: Mutex::new(CacheState::default()),
            fetched: Condvar::new(),
        }
    }

    /// Whether this package has already been fetched (successfully or not).
    /// Incomplete mode uses this to refuse work on anything new.
    pub(crate) fn contains(&self, package: &PackageId) -> bool {
        let state = self.state.lock().unwrap();
        state.containers.contains_key(package)
    }

    pub(crate) fn get(
        self: &Arc<Self>,
        package: &PackageId,
    ) -> Result<Arc<dyn Container>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(cached) = state.containers.get(package) {
                return cached.clone();
            }
            if state.prefetching.contains(package) {
                state = self.fetched.wait(state).unwrap();
                continue;
            }
            // Nobody is fetching this one; claim it so that concurrent
            // readers park on the condvar instead of fetching twice.
            state.prefetching.insert(package.clone());
            break;
        }
        drop(state);

        let result = self.fetch(package);
        self.complete(package.clone(), result.clone());
        result
    }

    /// Kicks off background fetches for every package not already cached or
    /// in flight. Fire and forget; errors surface when `get` is called.
    pub(crate) fn prefetch<I: IntoIterator<Item = PackageId>>(self: &Arc<Self>, packages: I) {
        for package in packages {
            {
                let mut state = self.state.lock().unwrap();
                if state.containers.contains_key(&package)
                    || state.prefetching.contains(&package)
                {
                    continue;
                }
                state.prefetching.insert(package.clone());
            }

            trace!(target: LOGNAME, "prefetching container for {}", package);
            let cache = Arc::clone(self);
            thread::spawn(move || {
                let result = cache.fetch(&package);
                cache.complete(package, result);
            });
        }
    }

    /// A read-only snapshot of every successfully fetched container.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Container>> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .values()
            .filter_map(|cached| cached.as_ref().ok().cloned())
            .collect()
    }

    fn fetch(&self, package: &PackageId) -> Result<Arc<dyn Container>, ProviderError> {
        if let Some(delegate) = &self.delegate {
            delegate.fetching_container(package);
        }
        let result = self.provider.get_container(package, self.skip_update);
        if let Some(delegate) = &self.delegate {
            delegate.fetched_container(package);
        }
        result
    }

    fn complete(&self, package: PackageId, result: Result<Arc<dyn Container>, ProviderError>) {
        let mut state = self.state.lock().unwrap();
        state.prefetching.remove(&package);
        state.containers.insert(package, result);
        drop(state);
        self.fetched.notify_all();
    }
}
