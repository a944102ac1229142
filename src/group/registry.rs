//! Group Registry
//!
//! Maps group names to [`Group`]s. A process-wide instance starts empty and
//! is never torn down; groups live for the rest of the process once created.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use super::getter::Getter;
use super::stats::GroupStatsSnapshot;
use super::Group;
use crate::cache::CacheStats;
use crate::error::Result;

static GLOBAL: Lazy<Arc<GroupRegistry>> = Lazy::new(|| Arc::new(GroupRegistry::new()));

/// Name -> group mapping guarded by a reader/writer lock
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

/// Counters of one group, as exported by the registry
#[derive(Debug, Clone, Serialize)]
pub struct GroupSnapshot {
    pub name: String,
    pub stats: GroupStatsSnapshot,
    pub cache: CacheStats,
}

impl GroupRegistry {
    /// Create an empty, private registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<GroupRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Create a group and register it under `name`, replacing any group that
    /// already used the name
    pub fn new_group<G>(&self, name: impl Into<String>, cache_bytes: u64, getter: G) -> Result<Arc<Group>>
    where
        G: Getter + 'static,
    {
        let name = name.into();
        let group = Arc::new(Group::new(name.clone(), cache_bytes, Arc::new(getter))?);

        let previous = self.groups.write().insert(name.clone(), Arc::clone(&group));
        if previous.is_some() {
            info!(group = %name, "replaced existing group");
        } else {
            info!(group = %name, cache_bytes, "registered group");
        }

        Ok(group)
    }

    /// Look up a group by name
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Counters for every registered group, sorted by name
    pub fn snapshot(&self) -> Vec<GroupSnapshot> {
        let mut snapshots: Vec<GroupSnapshot> = self
            .groups
            .read()
            .values()
            .map(|group| GroupSnapshot {
                name: group.name().to_string(),
                stats: group.stats(),
                cache: group.cache_stats(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let groups = self.groups.read();
        let mut names: Vec<&str> = groups.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("GroupRegistry").field("groups", &names).finish()
    }
}

/// Create a group in the process-wide registry
pub fn new_group<G>(name: impl Into<String>, cache_bytes: u64, getter: G) -> Result<Arc<Group>>
where
    G: Getter + 'static,
{
    GLOBAL.new_group(name, cache_bytes, getter)
}

/// Look up a group in the process-wide registry
pub fn get_group(name: &str) -> Option<Arc<Group>> {
    GLOBAL.get_group(name)
}
