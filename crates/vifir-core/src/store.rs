// Session-scoped volatile context store.
//
// Hands object references discovered by one step to a later step
// within the same session. One read/write-locked map is the only
// explicit mutual-exclusion primitive in the core; everything else is
// message passing or per-task state.

use std::any::Any;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::CoreError;

/// Typed key/value cache scoped to one session's lifetime.
///
/// Created fresh each time the session's client is (re)built; nothing
/// survives a reconnect. Values are stored type-erased but read back
/// through typed accessors, so a mismatched read is an explicit error
/// instead of a runtime cast failure. Concurrent `set`/`get` from
/// multiple tasks is the expected usage pattern.
#[derive(Default)]
pub struct ContextStore {
    data: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        let mut data = self.data.write().expect("context store lock poisoned");
        data.insert(key.into(), Box::new(value));
    }

    /// Fetch a clone of the value stored under `key`.
    ///
    /// `KeyNotFound` is a normal, recoverable condition -- it means the
    /// producing step was skipped or yielded nothing. `WrongType` means
    /// the caller and the producer disagree about the key's payload.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Result<T, CoreError> {
        let data = self.data.read().expect("context store lock poisoned");
        let value = data.get(key).ok_or_else(|| CoreError::KeyNotFound {
            key: key.to_owned(),
        })?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| CoreError::WrongType {
                key: key.to_owned(),
            })
    }

    /// Whether `key` currently holds a value.
    pub fn contains(&self, key: &str) -> bool {
        self.data
            .read()
            .expect("context store lock poisoned")
            .contains_key(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let store = ContextStore::new();
        store.set("host-list", vec!["host-1".to_owned(), "host-2".to_owned()]);

        let hosts: Vec<String> = store.get("host-list").unwrap();
        assert_eq!(hosts, vec!["host-1", "host-2"]);
    }

    #[test]
    fn missing_key_is_key_not_found() {
        let store = ContextStore::new();
        let result = store.get::<Vec<String>>("never-set");
        assert!(matches!(result, Err(CoreError::KeyNotFound { .. })));
    }

    #[test]
    fn mismatched_type_is_wrong_type() {
        let store = ContextStore::new();
        store.set("count", 3_u64);
        let result = store.get::<String>("count");
        assert!(matches!(result, Err(CoreError::WrongType { .. })));
    }

    #[test]
    fn set_replaces_previous_value() {
        let store = ContextStore::new();
        store.set("key", 1_u64);
        store.set("key", 2_u64);
        assert_eq!(store.get::<u64>("key").unwrap(), 2);
    }

    #[test]
    fn concurrent_readers_and_writers_do_not_lose_updates() {
        use std::sync::Arc;

        let store = Arc::new(ContextStore::new());
        let mut handles = Vec::new();

        for i in 0..8_u64 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.set(format!("key-{i}"), i);
                // Reads of other keys race with writes; absence is fine,
                // a torn value is not.
                for j in 0..8_u64 {
                    if let Ok(v) = store.get::<u64>(&format!("key-{j}")) {
                        assert_eq!(v, j);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        for i in 0..8_u64 {
            assert_eq!(store.get::<u64>(&format!("key-{i}")).unwrap(), i);
        }
    }
}
