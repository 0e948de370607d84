//! Session-scoped cache for the caller's own location.

use crate::domain::entities::LocationRecord;
use std::sync::Arc;

/// Holds at most one successfully resolved self-lookup record.
///
/// Starts empty and is only ever populated with a record; a failed sweep
/// leaves it untouched so the next call retries. Synchronization is the
/// owner's job.
#[derive(Debug, Default)]
pub struct SessionCache {
    record: Option<Arc<LocationRecord>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<LocationRecord>> {
        self.record.clone()
    }

    /// Store a record, replacing any previous one.
    pub fn set(&mut self, record: Arc<LocationRecord>) {
        self.record = Some(record);
    }

    pub fn is_populated(&self) -> bool {
        self.record.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cache_is_empty() {
        let cache = SessionCache::new();
        assert!(!cache.is_populated());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_set_then_get_shares_record() {
        let mut cache = SessionCache::new();
        let record = Arc::new(LocationRecord::new("ipwho.is"));
        cache.set(record.clone());

        assert!(cache.is_populated());
        let cached = cache.get().unwrap();
        assert!(Arc::ptr_eq(&cached, &record));
    }

    #[test]
    fn test_set_replaces() {
        let mut cache = SessionCache::new();
        cache.set(Arc::new(LocationRecord::new("a")));
        cache.set(Arc::new(LocationRecord::new("b")));
        assert_eq!(cache.get().unwrap().source, "b");
    }
}
