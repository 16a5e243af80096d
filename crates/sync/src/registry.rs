//! Static table of the refresh jobs the guard watches.

use drep_core::DrepError;
use serde::Serialize;

/// Threshold used for sync types that are not registered.
pub const DEFAULT_THRESHOLD_MINS: i64 = 120;

/// One periodic refresh job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTypeSpec {
    pub name: String,
    /// Staleness threshold used by the health endpoint.
    pub health_threshold_mins: i64,
    /// Staleness threshold used by the freshness guard. Looser than the
    /// health threshold so the scheduler gets a chance first.
    pub guard_threshold_mins: i64,
    /// Path of the refresh entry point, relative to the refresh base URL.
    pub refresh_path: String,
}

impl SyncTypeSpec {
    pub fn new(name: &str, health_threshold_mins: i64, guard_threshold_mins: i64) -> Self {
        Self {
            name: name.to_string(),
            health_threshold_mins,
            guard_threshold_mins,
            refresh_path: format!("/api/sync/{name}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncRegistry {
    types: Vec<SyncTypeSpec>,
}

impl SyncRegistry {
    pub fn new(types: Vec<SyncTypeSpec>) -> Self {
        Self { types }
    }

    /// The five refresh jobs of a standard deployment.
    pub fn standard() -> Self {
        Self::new(vec![
            SyncTypeSpec::new("proposals", 60, 90),
            SyncTypeSpec::new("dreps", 120, 180),
            SyncTypeSpec::new("votes", 60, 90),
            SyncTypeSpec::new("secondary", 360, 480),
            SyncTypeSpec::new("slow", 1500, 1560),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&SyncTypeSpec> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&SyncTypeSpec, DrepError> {
        self.get(name)
            .ok_or_else(|| DrepError::UnknownSyncType(name.to_string()))
    }

    pub fn health_threshold(&self, name: &str) -> i64 {
        self.get(name)
            .map_or(DEFAULT_THRESHOLD_MINS, |t| t.health_threshold_mins)
    }

    pub fn guard_threshold(&self, name: &str) -> i64 {
        self.get(name)
            .map_or(DEFAULT_THRESHOLD_MINS, |t| t.guard_threshold_mins)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncTypeSpec> {
        self.types.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for SyncRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
