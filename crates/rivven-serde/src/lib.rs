//! # Rivven Serde
//!
//! Schema-registry-backed serializer for Rivven producers and consumers.
//!
//! Values are encoded against a schema held by a Confluent-compatible
//! schema registry (Confluent, Apicurio, `rivven-schema`) and framed with
//! the Confluent wire header, so any consumer that understands that format
//! can read them back.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────┬────────────────────┬──────────────────────────┐
//! │  0x00    │  schema id (u32 BE)│  Avro binary payload     │
//! │  1 byte  │  4 bytes           │  variable                │
//! └──────────┴────────────────────┴──────────────────────────┘
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! encode: value ─serde─> JSON ─schema─> Avro value ─> binary ─> header + payload
//! decode: header ─id─> schema text (cache, else remote) ─> Avro value ─> JSON ─hook─> T
//! ```
//!
//! Decoding is keyed by the schema id carried in the message, so messages
//! written under an older version of a subject stay readable after the
//! subject has been rebound.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rivven_serde::{json_hook, RegistryConfig, SchemaRegistry};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Driver {
//!     id: i64,
//!     name: String,
//! }
//!
//! let registry: SchemaRegistry<Driver> =
//!     SchemaRegistry::new(RegistryConfig::new("http://localhost:8081"))?;
//! registry.register("drivers-value", 1u32, json_hook::<Driver>()).await?;
//!
//! let codec = registry.with_schema("drivers-value")?;
//! let bytes = codec.encode(&Driver { id: 1000, name: "Ada".into() })?;
//! let driver = codec.decode(&bytes).await?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod hook;
pub mod registry;
pub mod serializer;
pub mod types;
pub mod wire;

pub use client::{HttpRegistryClient, RegistryClient, SharedClient};
pub use config::{FetchPolicy, RegistryConfig};
pub use engine::{AvroCodec, AvroEngine, CodecEngine, SchemaCodec};
pub use error::{RegistryError, RegistryResult, SerdeError, SerdeResult};
pub use hook::{json_hook, DecodeHook, JsonHook};
pub use registry::SchemaRegistry;
pub use serializer::SubjectCodec;
pub use types::{SchemaEntry, SchemaId, SchemaVersion, Subject, SubjectSchema};
