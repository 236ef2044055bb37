//! Rivven Serde CLI
//!
//! Encode and decode Confluent-framed messages against a running registry.
//!
//! ## Usage
//!
//! ```bash
//! # Print a schema by id
//! rivven-serde schema --id 1
//!
//! # Encode a JSON value under the latest version of a subject
//! rivven-serde encode --subject drivers-value --json '{"id": 1000, "name": "Ada"}'
//!
//! # Decode hex wire bytes back to JSON
//! rivven-serde decode --subject drivers-value --hex 00000000010...
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use rivven_serde::{
    json_hook, RegistryConfig, SchemaId, SchemaRegistry, SchemaVersion, Subject,
};
use serde_json::Value as JsonValue;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "rivven-serde")]
#[command(
    author,
    version,
    about = "Rivven Serde - schema-registry-backed Avro encoding"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Schema registry URL
    #[arg(long, default_value = "http://localhost:8081", global = true)]
    url: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", global = true)]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print schema text by id
    Schema {
        /// Schema ID
        #[arg(short, long)]
        id: u32,
    },

    /// Encode a JSON value into a framed message (hex)
    Encode {
        /// Subject name
        #[arg(short, long)]
        subject: String,

        /// Subject version (default: latest)
        #[arg(short, long)]
        version: Option<u32>,

        /// JSON value to encode
        #[arg(short, long)]
        json: String,
    },

    /// Decode a framed message (hex) into JSON
    Decode {
        /// Subject whose schema is registered for decoding
        #[arg(short, long)]
        subject: String,

        /// Subject version (default: latest)
        #[arg(short, long)]
        version: Option<u32>,

        /// Hex-encoded message
        #[arg(long)]
        hex: String,
    },

    /// Check schema compatibility
    Compat {
        /// Subject name
        #[arg(short, long)]
        subject: String,

        /// Schema file path
        #[arg(short = 'f', long)]
        file: String,

        /// Version to check against (default: latest)
        #[arg(short, long)]
        version: Option<u32>,
    },
}

fn version_arg(version: Option<u32>) -> SchemaVersion {
    version.map(SchemaVersion::from).unwrap_or_default()
}

fn passthrough(json: &[u8]) -> anyhow::Result<JsonValue> {
    Ok(serde_json::from_slice(json)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = RegistryConfig::new(&cli.url)
        .with_timeout(std::time::Duration::from_secs(cli.timeout));
    debug!(?config, "Connecting to schema registry");

    let registry: SchemaRegistry<JsonValue> = SchemaRegistry::new(config)
        .with_context(|| format!("invalid registry configuration for {}", cli.url))?;

    match cli.command {
        Commands::Schema { id } => {
            let schema = registry.get_or_fetch(SchemaId::new(id)).await?;
            println!("{}", schema);
        }

        Commands::Encode {
            subject,
            version,
            json,
        } => {
            let value: JsonValue =
                serde_json::from_str(&json).context("--json is not valid JSON")?;

            registry
                .register(Subject::new(&subject), version_arg(version), passthrough)
                .await?;
            let bytes = registry.with_schema(subject)?.encode(&value)?;
            println!("{}", hex::encode(&bytes));
        }

        Commands::Decode {
            subject,
            version,
            hex: message,
        } => {
            let bytes = hex::decode(message.trim()).context("--hex is not valid hex")?;

            registry
                .register(Subject::new(&subject), version_arg(version), json_hook::<JsonValue>())
                .await?;
            let value = registry.decode(&bytes).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }

        Commands::Compat {
            subject,
            file,
            version,
        } => {
            let schema = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read schema file {}", file))?;

            let compatible = registry
                .is_compatible(&schema, subject.as_str(), version_arg(version))
                .await?;
            if compatible {
                println!("✓ Schema is compatible");
            } else {
                println!("✗ Schema is NOT compatible");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
