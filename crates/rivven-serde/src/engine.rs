//! Schema codec engines
//!
//! An engine compiles registry schema text into a reusable codec. A codec
//! moves a message through three representations:
//!
//! ```text
//! textual (JSON bytes) <-> native (engine value) <-> binary (wire payload)
//! ```
//!
//! [`AvroEngine`] is the default engine, built on `apache-avro`. JSON is
//! converted to Avro values by walking the schema, so records pick up field
//! defaults and unions accept both the bare value and the `{"type": value}`
//! wrapped form. On the way back unions are unwrapped, which keeps the
//! textual form deserializable straight into plain serde types.

use crate::error::{SerdeError, SerdeResult};
use apache_avro::schema::Name;
use apache_avro::{
    from_avro_datum, to_avro_datum, types::Value as AvroValue, Decimal, Duration as AvroDuration,
    Schema,
};
use base64::Engine as _;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::Cursor;

/// Compiles schema text into codecs
pub trait CodecEngine: Send + Sync + 'static {
    type Codec: SchemaCodec;

    /// Compile schema text; fails with [`SerdeError::SchemaCompile`]
    fn compile(&self, schema: &str) -> SerdeResult<Self::Codec>;
}

/// A compiled schema able to convert between representations
pub trait SchemaCodec: Send + Sync + 'static {
    type Native;

    /// Parse JSON text into a native value; fails with [`SerdeError::SchemaMismatch`]
    fn textual_to_native(&self, text: &[u8]) -> SerdeResult<Self::Native>;

    /// Append the binary encoding of `native` to `out`
    fn native_to_binary(&self, native: Self::Native, out: &mut Vec<u8>) -> SerdeResult<()>;

    /// Decode a binary payload; fails with [`SerdeError::PayloadDecode`]
    fn binary_to_native(&self, bytes: &[u8]) -> SerdeResult<Self::Native>;

    /// Render a native value as JSON text
    fn native_to_textual(&self, native: &Self::Native) -> SerdeResult<Vec<u8>>;
}

/// Apache Avro engine
#[derive(Debug, Clone, Copy, Default)]
pub struct AvroEngine;

impl CodecEngine for AvroEngine {
    type Codec = AvroCodec;

    fn compile(&self, schema: &str) -> SerdeResult<AvroCodec> {
        AvroCodec::parse(schema)
    }
}

/// Compiled Avro schema
pub struct AvroCodec {
    schema: Schema,
    /// Named types, so `Ref` nodes can be followed during JSON conversion
    names: HashMap<Name, Schema>,
}

impl std::fmt::Debug for AvroCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvroCodec")
            .field("canonical", &self.schema.canonical_form())
            .finish()
    }
}

impl AvroCodec {
    /// Parse an Avro schema from its JSON text
    pub fn parse(schema: &str) -> SerdeResult<Self> {
        let schema =
            Schema::parse_str(schema).map_err(|e| SerdeError::SchemaCompile(e.to_string()))?;

        let mut names = HashMap::new();
        collect_names(&schema, &mut names);

        Ok(Self { schema, names })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Convert a JSON value into an Avro value shaped by this schema
    pub fn json_to_avro(&self, json: &JsonValue) -> SerdeResult<AvroValue> {
        self.convert(json, &self.schema)
            .map_err(SerdeError::SchemaMismatch)
    }

    fn resolve<'a>(&'a self, schema: &'a Schema) -> Result<&'a Schema, String> {
        match schema {
            Schema::Ref { name } => self
                .names
                .get(name)
                .ok_or_else(|| format!("Unknown named type: {}", name)),
            other => Ok(other),
        }
    }

    fn convert(&self, json: &JsonValue, schema: &Schema) -> Result<AvroValue, String> {
        let schema = self.resolve(schema)?;

        match (schema, json) {
            (Schema::Null, JsonValue::Null) => Ok(AvroValue::Null),

            (Schema::Boolean, JsonValue::Bool(b)) => Ok(AvroValue::Boolean(*b)),

            (Schema::Int, JsonValue::Number(n)) => Ok(AvroValue::Int(as_i32(n, "int")?)),

            (Schema::Long, JsonValue::Number(n)) => Ok(AvroValue::Long(as_i64(n, "long")?)),

            (Schema::Float, JsonValue::Number(n)) => Ok(AvroValue::Float(as_f64(n)? as f32)),

            (Schema::Double, JsonValue::Number(n)) => Ok(AvroValue::Double(as_f64(n)?)),

            (Schema::String, JsonValue::String(s)) => Ok(AvroValue::String(s.clone())),

            (Schema::Bytes, JsonValue::String(s)) => Ok(AvroValue::Bytes(decode_base64(s)?)),

            (Schema::Uuid, JsonValue::String(s)) => uuid::Uuid::parse_str(s)
                .map(AvroValue::Uuid)
                .map_err(|e| format!("Invalid uuid {:?}: {}", s, e)),

            (Schema::Date, JsonValue::Number(n)) => Ok(AvroValue::Date(as_i32(n, "date")?)),

            (Schema::TimeMillis, JsonValue::Number(n)) => {
                Ok(AvroValue::TimeMillis(as_i32(n, "time-millis")?))
            }

            (Schema::TimeMicros, JsonValue::Number(n)) => {
                Ok(AvroValue::TimeMicros(as_i64(n, "time-micros")?))
            }

            (Schema::TimestampMillis, JsonValue::Number(n)) => {
                Ok(AvroValue::TimestampMillis(as_i64(n, "timestamp-millis")?))
            }

            (Schema::TimestampMicros, JsonValue::Number(n)) => {
                Ok(AvroValue::TimestampMicros(as_i64(n, "timestamp-micros")?))
            }

            (Schema::LocalTimestampMillis, JsonValue::Number(n)) => Ok(
                AvroValue::LocalTimestampMillis(as_i64(n, "local-timestamp-millis")?),
            ),

            (Schema::LocalTimestampMicros, JsonValue::Number(n)) => Ok(
                AvroValue::LocalTimestampMicros(as_i64(n, "local-timestamp-micros")?),
            ),

            // two's-complement unscaled value, base64 like plain bytes
            (Schema::Decimal(_), JsonValue::String(s)) => {
                Ok(AvroValue::Decimal(Decimal::from(decode_base64(s)?)))
            }

            // months, days, millis as three little-endian u32, base64
            (Schema::Duration, JsonValue::String(s)) => {
                let bytes: [u8; 12] = decode_base64(s)?.try_into().map_err(|b: Vec<u8>| {
                    format!("Duration needs 12 bytes, got {}", b.len())
                })?;
                Ok(AvroValue::Duration(AvroDuration::from(bytes)))
            }

            (Schema::Array(array), JsonValue::Array(items)) => {
                let items = items
                    .iter()
                    .map(|item| self.convert(item, &array.items))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(AvroValue::Array(items))
            }

            (Schema::Map(map), JsonValue::Object(obj)) => {
                let mut values = HashMap::with_capacity(obj.len());
                for (k, v) in obj {
                    values.insert(k.clone(), self.convert(v, &map.types)?);
                }
                Ok(AvroValue::Map(values))
            }

            (Schema::Union(union), json) => {
                let variants = union.variants();

                // Wrapped form: {"string": "x"} or {"com.example.User": {...}}
                if let JsonValue::Object(obj) = json {
                    if obj.len() == 1 {
                        if let Some((key, value)) = obj.iter().next() {
                            for (idx, variant) in variants.iter().enumerate() {
                                if union_branch_matches(variant, key) {
                                    if let Ok(v) = self.convert(value, variant) {
                                        return Ok(AvroValue::Union(idx as u32, Box::new(v)));
                                    }
                                }
                            }
                        }
                    }
                }

                for (idx, variant) in variants.iter().enumerate() {
                    if let Ok(v) = self.convert(json, variant) {
                        return Ok(AvroValue::Union(idx as u32, Box::new(v)));
                    }
                }

                Err(format!("No matching union variant for: {}", json))
            }

            (Schema::Record(record), JsonValue::Object(obj)) => {
                let mut fields = Vec::with_capacity(record.fields.len());
                for field in &record.fields {
                    let value = match (obj.get(&field.name), &field.default) {
                        (Some(v), _) => self.convert(v, &field.schema),
                        (None, Some(default)) => self.convert(default, &field.schema),
                        (None, None) => {
                            return Err(format!(
                                "Missing required field {} in record {}",
                                field.name, record.name
                            ))
                        }
                    }
                    .map_err(|e| format!("{}: {}", field.name, e))?;
                    fields.push((field.name.clone(), value));
                }
                Ok(AvroValue::Record(fields))
            }

            (Schema::Enum(enum_schema), JsonValue::String(s)) => enum_schema
                .symbols
                .iter()
                .position(|sym| sym == s)
                .map(|pos| AvroValue::Enum(pos as u32, s.clone()))
                .ok_or_else(|| format!("Invalid enum symbol: {}", s)),

            (Schema::Fixed(fixed), JsonValue::String(s)) => {
                let bytes = decode_base64(s)?;
                if bytes.len() != fixed.size {
                    return Err(format!(
                        "Fixed size mismatch: expected {}, got {}",
                        fixed.size,
                        bytes.len()
                    ));
                }
                Ok(AvroValue::Fixed(fixed.size, bytes))
            }

            (schema, json) => Err(format!(
                "Type mismatch: expected {}, got {}",
                schema_type_name(schema),
                json
            )),
        }
    }
}

impl SchemaCodec for AvroCodec {
    type Native = AvroValue;

    fn textual_to_native(&self, text: &[u8]) -> SerdeResult<AvroValue> {
        let json: JsonValue = serde_json::from_slice(text)
            .map_err(|e| SerdeError::SchemaMismatch(format!("Invalid JSON input: {}", e)))?;
        self.json_to_avro(&json)
    }

    fn native_to_binary(&self, native: AvroValue, out: &mut Vec<u8>) -> SerdeResult<()> {
        let bytes = to_avro_datum(&self.schema, native)
            .map_err(|e| SerdeError::SchemaMismatch(e.to_string()))?;
        out.extend_from_slice(&bytes);
        Ok(())
    }

    fn binary_to_native(&self, bytes: &[u8]) -> SerdeResult<AvroValue> {
        let mut cursor = Cursor::new(bytes);
        let native = from_avro_datum(&self.schema, &mut cursor, None)
            .map_err(|e| SerdeError::PayloadDecode(e.to_string()))?;

        // a string or bytes field cut short reads back as Null instead of failing
        if !native.validate(&self.schema) {
            return Err(SerdeError::PayloadDecode(format!(
                "payload of {} bytes does not match schema {}",
                bytes.len(),
                schema_type_name(&self.schema)
            )));
        }
        Ok(native)
    }

    fn native_to_textual(&self, native: &AvroValue) -> SerdeResult<Vec<u8>> {
        let json = avro_to_json(native).map_err(SerdeError::PayloadDecode)?;
        Ok(serde_json::to_vec(&json)?)
    }
}

/// Convert an Avro value to JSON, unwrapping unions
pub fn avro_to_json(avro: &AvroValue) -> Result<JsonValue, String> {
    match avro {
        AvroValue::Null => Ok(JsonValue::Null),
        AvroValue::Boolean(b) => Ok(JsonValue::Bool(*b)),
        AvroValue::Int(i) | AvroValue::Date(i) | AvroValue::TimeMillis(i) => {
            Ok(JsonValue::Number((*i).into()))
        }
        AvroValue::Long(l)
        | AvroValue::TimeMicros(l)
        | AvroValue::TimestampMillis(l)
        | AvroValue::TimestampMicros(l)
        | AvroValue::LocalTimestampMillis(l)
        | AvroValue::LocalTimestampMicros(l) => Ok(JsonValue::Number((*l).into())),
        AvroValue::Float(f) => Ok(serde_json::json!(*f)),
        AvroValue::Double(d) => Ok(serde_json::json!(*d)),
        AvroValue::String(s) => Ok(JsonValue::String(s.clone())),
        AvroValue::Uuid(u) => Ok(JsonValue::String(u.to_string())),
        AvroValue::Bytes(b) | AvroValue::Fixed(_, b) => Ok(JsonValue::String(
            base64::engine::general_purpose::STANDARD.encode(b),
        )),
        AvroValue::Decimal(d) => {
            let bytes = Vec::<u8>::try_from(d).map_err(|e| e.to_string())?;
            Ok(JsonValue::String(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            ))
        }
        AvroValue::Duration(d) => Ok(JsonValue::String(
            base64::engine::general_purpose::STANDARD.encode(<[u8; 12]>::from(*d)),
        )),
        AvroValue::Array(items) => Ok(JsonValue::Array(
            items.iter().map(avro_to_json).collect::<Result<_, _>>()?,
        )),
        AvroValue::Map(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                obj.insert(k.clone(), avro_to_json(v)?);
            }
            Ok(JsonValue::Object(obj))
        }
        AvroValue::Union(_, inner) => avro_to_json(inner),
        AvroValue::Record(fields) => {
            let mut obj = serde_json::Map::new();
            for (name, value) in fields {
                obj.insert(name.clone(), avro_to_json(value)?);
            }
            Ok(JsonValue::Object(obj))
        }
        AvroValue::Enum(_, symbol) => Ok(JsonValue::String(symbol.clone())),
        other => Err(format!("Unsupported Avro value: {:?}", other)),
    }
}

fn collect_names(schema: &Schema, names: &mut HashMap<Name, Schema>) {
    match schema {
        Schema::Record(record) => {
            names.insert(record.name.clone(), schema.clone());
            for field in &record.fields {
                collect_names(&field.schema, names);
            }
        }
        Schema::Enum(e) => {
            names.insert(e.name.clone(), schema.clone());
        }
        Schema::Fixed(f) => {
            names.insert(f.name.clone(), schema.clone());
        }
        Schema::Array(array) => collect_names(&array.items, names),
        Schema::Map(map) => collect_names(&map.types, names),
        Schema::Union(union) => {
            for variant in union.variants() {
                collect_names(variant, names);
            }
        }
        _ => {}
    }
}

fn union_branch_matches(variant: &Schema, key: &str) -> bool {
    let named = match variant {
        Schema::Record(r) => Some(&r.name),
        Schema::Enum(e) => Some(&e.name),
        Schema::Fixed(f) => Some(&f.name),
        Schema::Ref { name } => Some(name),
        _ => None,
    };

    match named {
        Some(name) => key == name.name || key == name.fullname(None),
        None => key == schema_type_name(variant),
    }
}

fn schema_type_name(schema: &Schema) -> &'static str {
    match schema {
        Schema::Null => "null",
        Schema::Boolean => "boolean",
        Schema::Int => "int",
        Schema::Long => "long",
        Schema::Float => "float",
        Schema::Double => "double",
        Schema::Bytes => "bytes",
        Schema::String => "string",
        Schema::Array(_) => "array",
        Schema::Map(_) => "map",
        Schema::Union(_) => "union",
        Schema::Record(_) => "record",
        Schema::Enum(_) => "enum",
        Schema::Fixed(_) => "fixed",
        Schema::Uuid => "uuid",
        Schema::Date => "date",
        Schema::TimeMillis => "time-millis",
        Schema::TimeMicros => "time-micros",
        Schema::TimestampMillis => "timestamp-millis",
        Schema::TimestampMicros => "timestamp-micros",
        Schema::LocalTimestampMillis => "local-timestamp-millis",
        Schema::LocalTimestampMicros => "local-timestamp-micros",
        Schema::Decimal(_) => "decimal",
        Schema::Duration => "duration",
        _ => "unknown",
    }
}

fn as_i64(n: &serde_json::Number, kind: &str) -> Result<i64, String> {
    n.as_i64()
        .ok_or_else(|| format!("Expected {}, got {}", kind, n))
}

fn as_i32(n: &serde_json::Number, kind: &str) -> Result<i32, String> {
    let i = as_i64(n, kind)?;
    i32::try_from(i).map_err(|_| format!("Value {} out of {} range", i, kind))
}

fn as_f64(n: &serde_json::Number) -> Result<f64, String> {
    n.as_f64()
        .ok_or_else(|| format!("Expected floating point, got {}", n))
}

fn decode_base64(s: &str) -> Result<Vec<u8>, String> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| format!("Invalid base64: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(codec: &AvroCodec, value: JsonValue) -> JsonValue {
        let native = codec.textual_to_native(&serde_json::to_vec(&value).unwrap()).unwrap();
        let mut bytes = Vec::new();
        codec.native_to_binary(native, &mut bytes).unwrap();
        let decoded = codec.binary_to_native(&bytes).unwrap();
        serde_json::from_slice(&codec.native_to_textual(&decoded).unwrap()).unwrap()
    }

    #[test]
    fn test_compile_rejects_invalid_schema() {
        let err = AvroEngine.compile(r#"{"type": "record", "name": "Broken"}"#).unwrap_err();
        assert!(matches!(err, SerdeError::SchemaCompile(_)));

        let err = AvroEngine.compile("not json").unwrap_err();
        assert!(matches!(err, SerdeError::SchemaCompile(_)));
    }

    #[test]
    fn test_record_roundtrip() {
        let codec = AvroEngine
            .compile(
                r#"{
                    "type": "record",
                    "name": "User",
                    "fields": [
                        {"name": "id", "type": "long"},
                        {"name": "name", "type": "string"},
                        {"name": "score", "type": "double"}
                    ]
                }"#,
            )
            .unwrap();

        let value = json!({"id": 123, "name": "Alice", "score": 1.5});
        assert_eq!(roundtrip(&codec, value.clone()), value);
    }

    #[test]
    fn test_nullable_union_accepts_bare_and_wrapped() {
        let codec = AvroEngine
            .compile(
                r#"{
                    "type": "record",
                    "name": "User",
                    "fields": [
                        {"name": "email", "type": ["null", "string"], "default": null}
                    ]
                }"#,
            )
            .unwrap();

        assert_eq!(
            roundtrip(&codec, json!({"email": "a@example.com"})),
            json!({"email": "a@example.com"})
        );
        assert_eq!(
            roundtrip(&codec, json!({"email": {"string": "b@example.com"}})),
            json!({"email": "b@example.com"})
        );
        assert_eq!(roundtrip(&codec, json!({})), json!({"email": null}));
    }

    #[test]
    fn test_missing_required_field_is_mismatch() {
        let codec = AvroEngine
            .compile(
                r#"{"type": "record", "name": "User", "fields": [{"name": "id", "type": "long"}]}"#,
            )
            .unwrap();

        let err = codec.textual_to_native(br#"{"name": "x"}"#).unwrap_err();
        assert!(matches!(err, SerdeError::SchemaMismatch(_)));

        let err = codec.textual_to_native(br#"{"id": "not a number"}"#).unwrap_err();
        assert!(matches!(err, SerdeError::SchemaMismatch(_)));
    }

    #[test]
    fn test_int_range_checked() {
        let codec = AvroEngine.compile(r#""int""#).unwrap();
        assert!(codec.textual_to_native(b"2147483648").is_err());
        assert!(codec.textual_to_native(b"2147483647").is_ok());
    }

    #[test]
    fn test_enum_array_map() {
        let codec = AvroEngine
            .compile(
                r#"{
                    "type": "record",
                    "name": "Palette",
                    "fields": [
                        {"name": "primary", "type": {"type": "enum", "name": "Color", "symbols": ["RED", "GREEN"]}},
                        {"name": "tags", "type": {"type": "array", "items": "string"}},
                        {"name": "weights", "type": {"type": "map", "values": "long"}}
                    ]
                }"#,
            )
            .unwrap();

        let value = json!({"primary": "GREEN", "tags": ["a", "b"], "weights": {"x": 1}});
        assert_eq!(roundtrip(&codec, value.clone()), value);
        assert!(codec
            .textual_to_native(br#"{"primary": "BLUE", "tags": [], "weights": {}}"#)
            .is_err());
    }

    #[test]
    fn test_named_type_reference() {
        let codec = AvroEngine
            .compile(
                r#"{
                    "type": "record",
                    "name": "Transfer",
                    "namespace": "com.example",
                    "fields": [
                        {"name": "from", "type": {"type": "record", "name": "Account", "fields": [{"name": "iban", "type": "string"}]}},
                        {"name": "to", "type": "Account"}
                    ]
                }"#,
            )
            .unwrap();

        let value = json!({"from": {"iban": "DE01"}, "to": {"iban": "DE02"}});
        assert_eq!(roundtrip(&codec, value.clone()), value);
    }

    #[test]
    fn test_bytes_and_uuid() {
        let codec = AvroEngine
            .compile(
                r#"{
                    "type": "record",
                    "name": "Blob",
                    "fields": [
                        {"name": "id", "type": {"type": "string", "logicalType": "uuid"}},
                        {"name": "data", "type": "bytes"}
                    ]
                }"#,
            )
            .unwrap();

        let value = json!({"id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "data": "AQID"});
        assert_eq!(roundtrip(&codec, value.clone()), value);
    }

    #[test]
    fn test_decimal_and_local_timestamps() {
        let codec = AvroEngine
            .compile(
                r#"{
                    "type": "record",
                    "name": "Payment",
                    "fields": [
                        {"name": "amount", "type": {"type": "bytes", "logicalType": "decimal", "precision": 10, "scale": 2}},
                        {"name": "at", "type": {"type": "long", "logicalType": "local-timestamp-millis"}},
                        {"name": "at_micros", "type": {"type": "long", "logicalType": "local-timestamp-micros"}}
                    ]
                }"#,
            )
            .unwrap();

        // 0x0102 = 258 unscaled, i.e. 2.58
        let value = json!({"amount": "AQI=", "at": 1, "at_micros": 1_700_000_000_000_000i64});
        assert_eq!(roundtrip(&codec, value.clone()), value);

        let err = codec
            .textual_to_native(br#"{"amount": 2.58, "at": 1, "at_micros": 1}"#)
            .unwrap_err();
        assert!(matches!(err, SerdeError::SchemaMismatch(_)));
    }

    #[test]
    fn test_duration() {
        let codec = AvroEngine
            .compile(
                r#"{"type": "fixed", "name": "Span", "size": 12, "logicalType": "duration"}"#,
            )
            .unwrap();

        // 1 month, 2 days, 3 millis
        let value = json!("AQAAAAIAAAADAAAA");
        assert_eq!(roundtrip(&codec, value.clone()), value);
        assert!(codec.textual_to_native(br#""AQID""#).is_err());
    }

    #[test]
    fn test_truncated_record_fails() {
        let codec = AvroEngine
            .compile(
                r#"{"type": "record", "name": "User", "fields": [{"name": "id", "type": "long"}, {"name": "name", "type": "string"}]}"#,
            )
            .unwrap();

        let native = codec
            .textual_to_native(br#"{"id": 1, "name": "driver-1"}"#)
            .unwrap();
        let mut bytes = Vec::new();
        codec.native_to_binary(native, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);

        let err = codec.binary_to_native(&bytes).unwrap_err();
        assert!(matches!(err, SerdeError::PayloadDecode(_)));
    }

    #[test]
    fn test_truncated_payload_fails() {
        let codec = AvroEngine.compile(r#""string""#).unwrap();
        // length prefix says 20 bytes, only 2 follow
        let err = codec.binary_to_native(&[0x28, b'a', b'b']).unwrap_err();
        assert!(matches!(err, SerdeError::PayloadDecode(_)));
    }
}
