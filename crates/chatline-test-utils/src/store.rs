use chatline_core::{KeyValueStore, StoreError};

/// Store whose reads find nothing and whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("storage quota exceeded")))
    }
}
