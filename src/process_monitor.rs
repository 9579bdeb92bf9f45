//! Running-process sampling
//!
//! Game detection matches on executable names, so every process contributes
//! all the names it can be known by: the kernel's short name, the file name
//! of its executable and the base name of its first argument. The last one
//! is what identifies Wine/Proton games, whose argv[0] is a Windows path.

use anyhow::Result;
use std::collections::HashSet;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, error};

/// Source of raw process names
pub trait ProcessSource: Send {
    /// Every name of every running process, any case, duplicates allowed
    fn running_names(&mut self) -> Result<Vec<String>>;
}

/// Last path component, accepting both Unix and Windows separators
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Names one process may be matched by, lowercased and without empties
pub fn executable_names(name: &str, exe: Option<&str>, argv0: Option<&str>) -> Vec<String> {
    let mut names = vec![name.to_lowercase()];
    for path in [exe, argv0].into_iter().flatten() {
        let base = base_name(path.trim()).to_lowercase();
        if !names.contains(&base) {
            names.push(base);
        }
    }
    names.retain(|n| !n.is_empty());
    names
}

/// Process table read through `sysinfo`
pub struct SysinfoProcessSource {
    system: System,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoProcessSource {
    fn running_names(&mut self) -> Result<Vec<String>> {
        let refresh = ProcessRefreshKind::nothing()
            .with_exe(UpdateKind::OnlyIfNotSet)
            .with_cmd(UpdateKind::OnlyIfNotSet);
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);

        let mut names = Vec::new();
        for process in self.system.processes().values() {
            let name = process.name().to_string_lossy();
            let exe = process.exe().map(|p| p.to_string_lossy());
            let argv0 = process.cmd().first().map(|a| a.to_string_lossy());
            names.extend(executable_names(&name, exe.as_deref(), argv0.as_deref()));
        }

        if names.is_empty() {
            anyhow::bail!("process table is empty");
        }
        Ok(names)
    }
}

/// Samples the process table; failures degrade to "nothing running"
pub struct ProcessMonitor<S: ProcessSource> {
    source: S,
}

impl<S: ProcessSource> ProcessMonitor<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Lowercase names of all running processes. Never fails: an unreadable
    /// process table yields an empty set.
    pub fn poll(&mut self) -> HashSet<String> {
        match self.source.running_names() {
            Ok(names) => {
                let set: HashSet<String> = names.into_iter().map(|n| n.to_lowercase()).collect();
                debug!(count = set.len(), "Sampled process table");
                set
            }
            Err(e) => {
                error!(error = %e, "Failed to enumerate processes");
                HashSet::new()
            }
        }
    }

    /// Sorted, de-duplicated running names containing `filter` (case-insensitive)
    pub fn scan(&mut self, filter: &str) -> Vec<String> {
        let filter = filter.trim().to_lowercase();
        let mut names: Vec<String> = self
            .poll()
            .into_iter()
            .filter(|n| n.contains(&filter))
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Process table scripted from tests
    #[derive(Clone, Default)]
    pub struct FakeProcessSource {
        pub names: Arc<Mutex<Option<Vec<String>>>>,
    }

    impl FakeProcessSource {
        pub fn set(&self, names: &[&str]) {
            *self.names.lock().unwrap() = Some(names.iter().map(|n| n.to_string()).collect());
        }

        /// Make the next polls fail
        pub fn fail(&self) {
            *self.names.lock().unwrap() = None;
        }
    }

    impl ProcessSource for FakeProcessSource {
        fn running_names(&mut self) -> Result<Vec<String>> {
            self.names
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| anyhow::anyhow!("permission denied"))
        }
    }
}
