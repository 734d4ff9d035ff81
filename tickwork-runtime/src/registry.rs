use crate::error::ConfigError;
use crate::monitor::JobMonitor;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Name → monitor map owned by a scheduler.
///
/// Written once per task at registration and read when the host starts and
/// stops. Names are never removed or replaced.
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    monitors: DashMap<String, Arc<JobMonitor>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh monitor under `name`.
    pub fn insert(&self, name: &str) -> Result<Arc<JobMonitor>, ConfigError> {
        match self.monitors.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ConfigError::DuplicateName {
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                let monitor = Arc::new(JobMonitor::new());
                slot.insert(Arc::clone(&monitor));
                Ok(monitor)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<JobMonitor>> {
        self.monitors.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.monitors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.monitors.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn duplicate_names_are_rejected_and_original_kept() {
        let registry = MonitorRegistry::new();
        let first = registry.insert("sync").unwrap();
        first.increment();

        let err = registry.insert("sync").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { name } if name == "sync"));

        let looked_up = registry.get("sync").unwrap();
        assert!(Arc::ptr_eq(&first, &looked_up));
        assert!(looked_up.is_running());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_names_are_absent() {
        let registry = MonitorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("ghost").is_none());
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn concurrent_registration_of_distinct_names() {
        let registry = Arc::new(MonitorRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.insert(&format!("task-{i}")).is_ok())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.names().first().map(String::as_str), Some("task-0"));
    }

    #[test]
    fn racing_registration_of_one_name_admits_exactly_one() {
        let registry = Arc::new(MonitorRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.insert("shared").is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
