//! Registry facade
//!
//! [`SchemaRegistry`] owns the schema cache and the remote client. Subjects
//! are registered up front together with a decode hook; afterwards
//! [`SchemaRegistry::with_schema`] hands out encode/decode handles.
//!
//! Registration policies differ on purpose:
//!
//! | call                | subject already registered          |
//! |---------------------|-------------------------------------|
//! | `register`          | warn, rebind the subject            |
//! | `register_latest`   | fail with `DuplicateSubject`        |

use crate::cache::{CodecCache, SchemaCache};
use crate::client::{HttpRegistryClient, SharedClient};
use crate::config::RegistryConfig;
use crate::engine::{AvroEngine, CodecEngine};
use crate::error::{RegistryResult, SerdeError, SerdeResult};
use crate::hook::DecodeHook;
use crate::serializer::SubjectCodec;
use crate::types::{SchemaEntry, SchemaId, SchemaVersion, Subject, SubjectSchema};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

pub(crate) struct RegistryInner<T, E: CodecEngine> {
    pub(crate) config: RegistryConfig,
    pub(crate) client: SharedClient,
    pub(crate) engine: E,
    pub(crate) cache: SchemaCache<T>,
    pub(crate) codecs: CodecCache<E::Codec>,
}

/// Schema-registry-backed serializer
///
/// `T` is the value type produced by decode hooks; `E` the schema engine.
/// Cloning is cheap and clones share the same cache.
pub struct SchemaRegistry<T = JsonValue, E: CodecEngine = AvroEngine> {
    inner: Arc<RegistryInner<T, E>>,
}

impl<T, E: CodecEngine> Clone for SchemaRegistry<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E: CodecEngine> std::fmt::Debug for SchemaRegistry<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("config", &self.inner.config)
            .field("subjects", &self.inner.cache.subjects())
            .finish()
    }
}

impl<T> SchemaRegistry<T, AvroEngine> {
    /// Create a registry talking HTTP to `config.url`
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        let client = HttpRegistryClient::new(&config)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Create a registry over an existing client
    pub fn with_client(config: RegistryConfig, client: SharedClient) -> Self {
        Self::with_engine(config, client, AvroEngine)
    }
}

impl<T, E: CodecEngine> SchemaRegistry<T, E> {
    /// Create a registry with a custom schema engine
    pub fn with_engine(config: RegistryConfig, client: SharedClient, engine: E) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                config,
                client,
                engine,
                cache: SchemaCache::new(),
                codecs: CodecCache::new(),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Bind `subject` at `version` to `hook`.
    ///
    /// Re-registering a subject is allowed: the subject is rebound, while the
    /// previous schema id stays decodable.
    pub async fn register<H>(
        &self,
        subject: impl Into<Subject>,
        version: impl Into<SchemaVersion>,
        hook: H,
    ) -> SerdeResult<Arc<SchemaEntry>>
    where
        H: DecodeHook<T> + 'static,
    {
        let subject = subject.into();
        let version = version.into();

        if self.inner.cache.contains_subject(&subject) {
            warn!(subject = %subject, "Subject already registered, rebinding");
        }

        let resolved = self
            .inner
            .client
            .get_schema_by_subject(&subject, version)
            .await
            .map_err(|source| {
                error!(subject = %subject, version = %version, error = %source, "Cannot get subject");
                SerdeError::Registration {
                    subject: subject.clone(),
                    version,
                    source,
                }
            })?;

        let entry = Arc::new(SchemaEntry::new(
            subject,
            resolved.schema,
            resolved.id,
            resolved.version,
        ));
        self.inner.cache.put(entry.clone(), Arc::new(hook));

        info!(
            subject = %entry.subject,
            schema_id = %entry.id,
            version = entry.version,
            "Registered subject"
        );

        Ok(entry)
    }

    /// Bind `subject` at its latest version to `hook`.
    ///
    /// Fails with [`SerdeError::DuplicateSubject`] if the subject is already
    /// registered, including when a concurrent registration wins the race.
    pub async fn register_latest<H>(
        &self,
        subject: impl Into<Subject>,
        hook: H,
    ) -> SerdeResult<Arc<SchemaEntry>>
    where
        H: DecodeHook<T> + 'static,
    {
        let subject = subject.into();

        if self.inner.cache.contains_subject(&subject) {
            error!(subject = %subject, "Subject already registered");
            return Err(SerdeError::DuplicateSubject(subject));
        }

        let resolved = self
            .inner
            .client
            .get_latest_schema(&subject)
            .await
            .map_err(|source| {
                error!(subject = %subject, error = %source, "Cannot get latest subject");
                SerdeError::Registration {
                    subject: subject.clone(),
                    version: SchemaVersion::Latest,
                    source,
                }
            })?;

        let entry = Arc::new(SchemaEntry::new(
            subject,
            resolved.schema,
            resolved.id,
            resolved.version,
        ));

        if self
            .inner
            .cache
            .put_if_absent(entry.clone(), Arc::new(hook))
            .is_err()
        {
            error!(subject = %entry.subject, "Subject registered concurrently");
            return Err(SerdeError::DuplicateSubject(entry.subject.clone()));
        }

        info!(
            subject = %entry.subject,
            schema_id = %entry.id,
            version = entry.version,
            "Registered latest subject"
        );

        Ok(entry)
    }

    /// Encode/decode handle for a registered subject
    pub fn with_schema(&self, subject: impl Into<Subject>) -> SerdeResult<SubjectCodec<T, E>> {
        let subject = subject.into();
        match self.inner.cache.get_by_subject(&subject) {
            Some(entry) => Ok(SubjectCodec::new(entry, self.inner.clone())),
            None => {
                error!(subject = %subject, "Unregistered subject");
                Err(SerdeError::UnknownSubject(subject))
            }
        }
    }

    /// Cached schema text for `id`; never touches the network
    pub fn get(&self, id: SchemaId) -> SerdeResult<Arc<str>> {
        self.inner.cache.schema_text(id).ok_or_else(|| {
            error!(schema_id = %id, "Schema id does not exist");
            SerdeError::SchemaNotFound(id)
        })
    }

    /// Cached schema text for `id`, fetched from the remote registry on a miss
    pub async fn get_or_fetch(&self, id: SchemaId) -> SerdeResult<Arc<str>> {
        self.inner.get_or_fetch(id).await
    }

    /// Ask the remote registry whether `schema` is compatible with `subject` at `version`
    pub async fn is_compatible(
        &self,
        schema: &str,
        subject: impl Into<Subject>,
        version: impl Into<SchemaVersion>,
    ) -> SerdeResult<bool> {
        let subject = subject.into();
        let version = version.into();

        self.inner
            .client
            .check_compatibility(schema, &subject, version)
            .await
            .map_err(|source| {
                error!(subject = %subject, version = %version, error = %source, "Cannot check compatibility");
                SerdeError::CompatibilityCheck {
                    subject,
                    version,
                    source,
                }
            })
    }

    /// Resolve `subject` at `version` remotely without binding it
    pub async fn lookup(
        &self,
        subject: impl Into<Subject>,
        version: impl Into<SchemaVersion>,
    ) -> SerdeResult<SubjectSchema> {
        let subject = subject.into();
        let version = version.into();

        self.inner
            .client
            .get_schema_by_subject(&subject, version)
            .await
            .map_err(|source| {
                error!(subject = %subject, version = %version, error = %source, "Cannot look up subject");
                SerdeError::Lookup {
                    subject,
                    version,
                    source,
                }
            })
    }

    /// Resolve the latest version of `subject` remotely without binding it
    pub async fn lookup_latest(&self, subject: impl Into<Subject>) -> SerdeResult<SubjectSchema> {
        let subject = subject.into();

        self.inner
            .client
            .get_latest_schema(&subject)
            .await
            .map_err(|source| {
                error!(subject = %subject, error = %source, "Cannot look up latest subject");
                SerdeError::Lookup {
                    subject,
                    version: SchemaVersion::Latest,
                    source,
                }
            })
    }

    /// Decode a framed message using the schema id in its header
    pub async fn decode(&self, message: &[u8]) -> SerdeResult<T> {
        self.inner.decode(message).await
    }

    /// Registered subjects, sorted
    pub fn subjects(&self) -> Vec<Subject> {
        self.inner.cache.subjects()
    }

    pub fn is_registered(&self, subject: impl Into<Subject>) -> bool {
        self.inner.cache.contains_subject(&subject.into())
    }
}
