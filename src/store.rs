use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// A request-scoped key/value bag.
///
/// Values are stored type-erased and read back through a typed downcast:
/// [`get`](Store::get) returns `None` both for a key that was never set and
/// for a value of a different type than the one asked for. Absence is a
/// normal outcome, never an error.
///
/// The store is clonable (handles share the same bag), so a streaming
/// handler can hand it to a task it cooperates with.
#[derive(Clone, Default)]
pub struct Store {
    values: Arc<Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`, overwriting any previous value.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values.lock().insert(key.into(), Arc::new(value));
    }

    /// Read the value stored under `key`, if it exists and is a `T`.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.values.lock().get(key).cloned()?;
        value.downcast().ok()
    }
}
