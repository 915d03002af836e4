//! Per-tenant write serialization
//!
//! Every mutating request runs load, mutate and save against one tenant's
//! namespace. Holding the tenant's lock across that sequence keeps two requests
//! in this process from both building on the same stale tree. Writers in other
//! processes are caught by the store's version check instead.

use crate::types::TenantId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-tenant lock manager
///
/// Different tenants never block each other; requests against the same tenant
/// are serialized.
pub struct TenantLockManager {
    locks: RwLock<HashMap<TenantId, Arc<Mutex<()>>>>,
}

impl TenantLockManager {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for `tenant`
    pub fn get_lock(&self, tenant: &TenantId) -> Arc<Mutex<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(tenant) {
                return lock.clone();
            }
        }

        // Another thread may have inserted between the read and write guards
        let mut map = self.locks.write();
        map.entry(tenant.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of tenants a lock has been handed out for
    pub fn tracked_tenants(&self) -> usize {
        self.locks.read().len()
    }
}

impl Default for TenantLockManager {
    fn default() -> Self {
        Self::new()
    }
}
