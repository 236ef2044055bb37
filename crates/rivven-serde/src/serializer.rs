//! Wire codec: encode values into framed messages and back
//!
//! Encoding is driven by a subject's [`SchemaEntry`]; decoding is driven by
//! the schema id found in the message header, so a [`SubjectCodec`] for one
//! subject can decode messages written under any registered or fetchable
//! schema.

use crate::config::FetchPolicy;
use crate::engine::{CodecEngine, SchemaCodec};
use crate::error::{SerdeError, SerdeResult};
use crate::registry::RegistryInner;
use crate::types::{SchemaEntry, SchemaId};
use crate::wire;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

impl<T, E: CodecEngine> RegistryInner<T, E> {
    /// Compiled codec for `id`, reusing the codec cache when enabled
    pub(crate) fn codec_for(&self, id: SchemaId, schema: &str) -> SerdeResult<Arc<E::Codec>> {
        if self.config.cache_codecs {
            if let Some(codec) = self.codecs.get(id) {
                return Ok(codec);
            }
        }

        let codec = self.engine.compile(schema).inspect_err(|e| {
            error!(schema_id = %id, error = %e, "Codec compilation failed");
        })?;
        debug!(schema_id = %id, "Compiled schema codec");

        let codec = Arc::new(codec);
        if self.config.cache_codecs {
            Ok(self.codecs.insert(id, codec))
        } else {
            Ok(codec)
        }
    }

    /// Schema text for `id` from the cache, falling back to the remote registry.
    ///
    /// No cache lock is held while the remote call is in flight.
    pub(crate) async fn get_or_fetch(&self, id: SchemaId) -> SerdeResult<Arc<str>> {
        if let Some(schema) = self.cache.schema_text(id) {
            return Ok(schema);
        }

        warn!(schema_id = %id, "Schema id not cached, fetching from remote registry");

        let schema: Arc<str> = self
            .client
            .get_schema_by_id(id)
            .await
            .map_err(|source| {
                error!(schema_id = %id, error = %source, "Remote schema fetch failed");
                SerdeError::RemoteFetch { id, source }
            })?
            .into();

        if self.config.fetch_policy == FetchPolicy::CacheOnFetch {
            self.cache.insert_fetched(id, schema.clone());
        }

        Ok(schema)
    }

    pub(crate) fn encode<V>(&self, entry: &SchemaEntry, value: &V) -> SerdeResult<Bytes>
    where
        V: Serialize + ?Sized,
    {
        let codec = self.codec_for(entry.id, &entry.schema)?;

        let text = serde_json::to_vec(value).inspect_err(|e| {
            error!(subject = %entry.subject, error = %e, "JSON serialization failed");
        })?;

        let native = codec.textual_to_native(&text).inspect_err(|e| {
            error!(subject = %entry.subject, schema_id = %entry.id, error = %e, "Value does not match schema");
        })?;

        let mut payload = Vec::with_capacity(text.len());
        codec.native_to_binary(native, &mut payload)?;

        Ok(wire::frame(entry.id, &payload))
    }

    pub(crate) async fn decode(&self, message: &[u8]) -> SerdeResult<T> {
        let (id, payload) = wire::decode_header(message).inspect_err(|e| {
            error!(len = message.len(), error = %e, "Cannot decode message header");
        })?;

        let schema = self.get_or_fetch(id).await?;
        let codec = self.codec_for(id, &schema)?;

        let native = codec.binary_to_native(payload).inspect_err(|e| {
            error!(schema_id = %id, error = %e, "Binary payload does not match schema");
        })?;
        let text = codec.native_to_textual(&native)?;

        let hook = self
            .cache
            .get_hook(id)
            .ok_or(SerdeError::UnregisteredDecoder(id))
            .inspect_err(|_| error!(schema_id = %id, "No decoder registered for schema id"))?;

        hook.decode(&text).map_err(SerdeError::Hook)
    }
}

/// Encode/decode handle bound to one registered subject
pub struct SubjectCodec<T, E: CodecEngine> {
    entry: Arc<SchemaEntry>,
    inner: Arc<RegistryInner<T, E>>,
}

impl<T, E: CodecEngine> Clone for SubjectCodec<T, E> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T, E: CodecEngine> std::fmt::Debug for SubjectCodec<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectCodec")
            .field("subject", &self.entry.subject)
            .field("schema_id", &self.entry.id)
            .field("version", &self.entry.version)
            .finish()
    }
}

impl<T, E: CodecEngine> SubjectCodec<T, E> {
    pub(crate) fn new(entry: Arc<SchemaEntry>, inner: Arc<RegistryInner<T, E>>) -> Self {
        Self { entry, inner }
    }

    pub fn entry(&self) -> &SchemaEntry {
        &self.entry
    }

    pub fn schema_id(&self) -> SchemaId {
        self.entry.id
    }

    pub fn schema(&self) -> &str {
        &self.entry.schema
    }

    /// Serialize `value` under this subject's schema into a framed message
    pub fn encode<V>(&self, value: &V) -> SerdeResult<Bytes>
    where
        V: Serialize + ?Sized,
    {
        self.inner.encode(&self.entry, value)
    }

    /// Decode a framed message using the schema id in its header
    pub async fn decode(&self, message: &[u8]) -> SerdeResult<T> {
        self.inner.decode(message).await
    }
}
