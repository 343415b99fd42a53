//! Permission authority seam.
//!
//! Capability ids have the form `read:<TypeId>`. The fetcher consults the
//! authority before touching the data source; requesting capabilities is
//! fire-and-forget and its outcome is only visible on the next
//! `granted_capabilities` call.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::registry;

pub fn read_capability(type_id: &str) -> String {
    format!("read:{type_id}")
}

/// Read capabilities for every registered type.
pub fn all_read_capabilities() -> HashSet<String> {
    registry::all_record_types()
        .iter()
        .map(|c| c.read_capability())
        .collect()
}

#[async_trait]
pub trait PermissionAuthority: Send + Sync + 'static {
    async fn granted_capabilities(&self) -> HashSet<String>;

    fn request_capabilities(&self, capabilities: HashSet<String>);
}

/// A fixed allow-list. Requests are recorded but never change the grant set.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    granted: HashSet<String>,
    requested: Mutex<HashSet<String>>,
}

impl StaticPermissions {
    pub fn new(granted: HashSet<String>) -> Self {
        Self {
            granted,
            requested: Mutex::new(HashSet::new()),
        }
    }

    pub fn allow_all() -> Self {
        Self::new(all_read_capabilities())
    }

    pub fn from_type_ids<I, S>(type_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            type_ids
                .into_iter()
                .map(|id| read_capability(id.as_ref()))
                .collect(),
        )
    }

    /// Capabilities asked for so far.
    pub fn requested(&self) -> HashSet<String> {
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl PermissionAuthority for StaticPermissions {
    async fn granted_capabilities(&self) -> HashSet<String> {
        self.granted.clone()
    }

    fn request_capabilities(&self, capabilities: HashSet<String>) {
        tracing::info!(count = capabilities.len(), "permission request recorded");
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(capabilities);
    }
}
