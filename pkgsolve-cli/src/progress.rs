// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use indicatif::ProgressBar;
use log::{LevelFilter, Metadata, Record};
use pretty_env_logger::env_logger::Logger;

/// Spinners keyed by a caller-chosen id, shared between the command flow and
/// the resolver's fetch delegate. Log records are routed through `suspended`
/// so a live spinner never tears a log line apart.
#[derive(Clone)]
pub(crate) struct ProgressTracker {
    bars: Arc<RwLock<HashMap<String, ProgressBar>>>,
}

impl ProgressTracker {
    pub(crate) fn new() -> ProgressTracker {
        ProgressTracker {
            bars: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub(crate) fn start<S: Into<String>>(&self, id: &str, message: S) {
        let bar = ProgressBar::new_spinner().with_message(message.into());
        bar.tick();
        self.bars.write().unwrap().insert(id.to_string(), bar);
    }

    pub(crate) fn update<S: Into<String>>(&self, id: &str, message: S) {
        if let Some(bar) = self.bars.read().unwrap().get(id) {
            bar.set_message(message.into());
            bar.tick();
        }
    }

    pub(crate) fn tick(&self, id: &str) {
        if let Some(bar) = self.bars.read().unwrap().get(id) {
            bar.tick();
        }
    }

    pub(crate) fn finish(&self, id: &str) {
        if let Some(bar) = self.bars.write().unwrap().remove(id) {
            bar.finish_and_clear();
        }
    }

    fn suspended(&self, callback: impl FnOnce()) {
        let bars = self.bars.read().unwrap();
        match bars.values().find(|bar| !bar.is_finished()) {
            Some(bar) => bar.suspend(callback),
            None => (callback)(),
        }
    }
}

struct ProgressAwareLog {
    inner: Logger,
    progress: ProgressTracker,
}

impl log::Log for ProgressAwareLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.inner.enabled(record.metadata()) {
            self.progress.suspended(|| self.inner.log(record));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Installs the global logger at the requested level, wired to the tracker.
pub(crate) fn install_logger(level: LevelFilter, progress: ProgressTracker) {
    let inner = pretty_env_logger::formatted_builder()
        .filter_level(level)
        .build();

    log::set_max_level(inner.filter());
    log::set_boxed_logger(Box::new(ProgressAwareLog { inner, progress })).unwrap();
}
