//! Request-scoped context shared by every step of one chain
//!
//! A [`Packet`] maps string keys to shared, type-erased values. Cloning a
//! packet copies the entries but not the values they point at, which is how
//! a chain forks independent sub-chains.

use crate::error::{Result, WorkError};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased packet value
pub type PacketValue = Arc<dyn Any + Send + Sync>;

/// Request-scoped key/value context
#[derive(Clone, Default)]
pub struct Packet {
    entries: HashMap<String, PacketValue>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous entry for `key`.
    pub fn put<T>(&mut self, key: impl Into<String>, value: T) -> Option<PacketValue>
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(key.into(), Arc::new(value))
    }

    /// Insert an already shared value.
    pub fn put_shared<T>(&mut self, key: impl Into<String>, value: Arc<T>) -> Option<PacketValue>
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(key.into(), value)
    }

    /// Typed lookup. Returns `None` when the key is absent or holds another type.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.entries.get(key).cloned()?.downcast::<T>().ok()
    }

    /// Typed lookup that reports why a value is unavailable.
    pub fn require<T>(&self, key: &str) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| WorkError::MissingPacketValue(key.to_string()))?;

        value
            .downcast::<T>()
            .map_err(|_| WorkError::PacketTypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn remove(&mut self, key: &str) -> Option<PacketValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shallow copy for an independent sub-chain.
    pub fn fork(&self) -> Packet {
        self.clone()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("Packet").field("keys", &keys).finish()
    }
}
