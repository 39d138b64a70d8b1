//! Call-to-user association registry
//!
//! One registry per running monitor. The monitoring loop is the only writer;
//! the map is concurrent so status readers never block it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

/// In-memory mapping from call id to the internal user handling it
#[derive(Debug, Clone)]
pub struct CallRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    calls: DashMap<String, String>,
    high_water: usize,
    above_high_water: AtomicBool,
}

impl CallRegistry {
    /// Create a registry that warns once it holds more than `high_water` calls
    pub fn new(high_water: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                calls: DashMap::new(),
                high_water,
                above_high_water: AtomicBool::new(false),
            }),
        }
    }

    /// Associate a call with a user, replacing any previous association
    pub fn register(&self, call_id: &str, user_id: &str) -> Option<String> {
        info!("Associating Call ID {} with User ID {}", call_id, user_id);
        let previous = self
            .inner
            .calls
            .insert(call_id.to_string(), user_id.to_string());

        let len = self.inner.calls.len();
        if len > self.inner.high_water {
            if !self.inner.above_high_water.swap(true, Ordering::Relaxed) {
                warn!(
                    "⚠️ Call registry holds {} associations (high water {}); are release events arriving?",
                    len, self.inner.high_water
                );
            }
        }
        previous
    }

    /// User currently associated with a call
    pub fn user_for(&self, call_id: &str) -> Option<String> {
        self.inner.calls.get(call_id).map(|entry| entry.value().clone())
    }

    /// Drop the association for a finished call
    pub fn release(&self, call_id: &str) -> Option<String> {
        let removed = self.inner.calls.remove(call_id).map(|(_, user)| user);
        if removed.is_some() {
            info!("Released association for Call ID {}", call_id);
            if self.inner.calls.len() <= self.inner.high_water {
                self.inner.above_high_water.store(false, Ordering::Relaxed);
            }
        }
        removed
    }

    /// Number of live associations
    pub fn len(&self) -> usize {
        self.inner.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.calls.is_empty()
    }

    /// Copy of all associations, for status reporting
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.inner
            .calls
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REGISTRY_HIGH_WATER)
    }
}
