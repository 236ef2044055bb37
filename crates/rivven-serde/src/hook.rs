//! Decode hooks: JSON text to application values
//!
//! A hook is registered per subject and stored under the subject's schema
//! id. After the wire codec has turned a binary payload back into JSON text,
//! the hook for the message's schema id produces the application value.
//!
//! Any `Fn(&[u8]) -> anyhow::Result<T>` closure is a hook. [`JsonHook`]
//! covers the common case of deserializing into a serde type and converting
//! it into the registry's value type.

use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Converts decoded JSON text into an application value
pub trait DecodeHook<T>: Send + Sync {
    fn decode(&self, json: &[u8]) -> anyhow::Result<T>;
}

impl<T, F> DecodeHook<T> for F
where
    F: Fn(&[u8]) -> anyhow::Result<T> + Send + Sync,
{
    fn decode(&self, json: &[u8]) -> anyhow::Result<T> {
        self(json)
    }
}

/// Hook deserializing into `D` and converting into the registry value type
pub struct JsonHook<D> {
    _marker: PhantomData<fn() -> D>,
}

impl<D> JsonHook<D> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<D> Default for JsonHook<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> std::fmt::Debug for JsonHook<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonHook")
            .field("target", &std::any::type_name::<D>())
            .finish()
    }
}

impl<T, D> DecodeHook<T> for JsonHook<D>
where
    D: DeserializeOwned + Into<T>,
{
    fn decode(&self, json: &[u8]) -> anyhow::Result<T> {
        let value: D = serde_json::from_slice(json)?;
        Ok(value.into())
    }
}

/// Shorthand for `JsonHook::<D>::new()`
pub fn json_hook<D>() -> JsonHook<D> {
    JsonHook::new()
}
