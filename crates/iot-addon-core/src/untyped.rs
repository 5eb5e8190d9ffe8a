//! Schema-less documents used at the aggregation boundary.
//!
//! An [`UntypedDoc`] is a JSON object whose kind is only known at runtime.
//! Turning it into a typed resource goes through an explicit decode step that
//! checks the discriminator and the required fields first, then decodes each
//! top-level section on its own so failures name the offending path.

use kube::core::TypeMeta;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TranslationError};
use crate::resources::{IotDaemonSet, IotDevice, IotKind, IotPod};

/// A resource kind that can be decoded from an [`UntypedDoc`].
pub trait Document: Serialize + DeserializeOwned + Sized {
    /// The discriminator this type accepts.
    const KIND: IotKind;

    /// Build the typed value from an already validated document.
    ///
    /// # Errors
    ///
    /// Returns an error naming the section that failed to decode.
    fn from_doc(doc: &UntypedDoc) -> Result<Self>;
}

/// A JSON object with no static schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UntypedDoc(Map<String, Value>);

impl UntypedDoc {
    /// Parse a document from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the bytes are not a JSON object.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| TranslationError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Wrap a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(TranslationError::Malformed(format!(
                "expected a JSON object, found {}",
                json_type(&other)
            ))),
        }
    }

    /// Serialize a typed value into a document.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the value does not serialize to an object.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        let value =
            serde_json::to_value(value).map_err(|e| TranslationError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// The `kind` discriminator, if present and a string.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    /// The `apiVersion`, if present and a string.
    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(Value::as_str)
    }

    /// A top-level field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The underlying object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a plain JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Serialize the document to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if serialization fails.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(|e| TranslationError::Malformed(e.to_string()))
    }

    /// Check the discriminator and required fields against `expected_kind`.
    ///
    /// # Errors
    ///
    /// Returns the first missing or mistyped field, or `KindMismatch`.
    pub fn validate(&self, expected_kind: &str) -> Result<()> {
        self.required_str("apiVersion")?;
        let kind = self.required_str("kind")?;
        if kind != expected_kind {
            return Err(TranslationError::KindMismatch {
                expected: expected_kind.to_string(),
                found: kind.to_string(),
            });
        }

        let metadata = match self.0.get("metadata") {
            None | Some(Value::Null) => return Err(TranslationError::missing("metadata")),
            Some(Value::Object(metadata)) => metadata,
            Some(other) => {
                return Err(TranslationError::mismatch(
                    "metadata",
                    "object",
                    format!("found {}", json_type(other)),
                ))
            }
        };

        match metadata.get("name") {
            None | Some(Value::Null) => Err(TranslationError::missing("metadata.name")),
            Some(Value::String(_)) => Ok(()),
            Some(other) => Err(TranslationError::mismatch(
                "metadata.name",
                "string",
                format!("found {}", json_type(other)),
            )),
        }
    }

    /// Validate and decode into a typed resource.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslationError`] naming the offending field; no partially
    /// populated value is ever returned.
    pub fn decode<T: Document>(&self) -> Result<T> {
        self.validate(T::KIND.kind())?;
        T::from_doc(self)
    }

    /// Dispatch on the `kind` discriminator and decode.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown kinds or invalid documents.
    pub fn classify(&self) -> Result<TypedDoc> {
        let kind = self.required_str("kind")?;
        match IotKind::from_kind(kind) {
            Some(IotKind::Device) => self.decode().map(TypedDoc::Device),
            Some(IotKind::Pod) => self.decode().map(TypedDoc::Pod),
            Some(IotKind::DaemonSet) => self.decode().map(TypedDoc::DaemonSet),
            None => Err(TranslationError::mismatch(
                "kind",
                "IotDevice, IotPod or IotDaemonSet",
                format!("unknown kind {kind:?}"),
            )),
        }
    }

    /// Type metadata of a validated document.
    #[must_use]
    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta {
            api_version: self.api_version().unwrap_or_default().to_string(),
            kind: self.kind().unwrap_or_default().to_string(),
        }
    }

    /// Decode a required top-level section.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` or `TypeMismatch` at `key`.
    pub fn section<S: DeserializeOwned>(&self, key: &str) -> Result<S> {
        let value = self.0.get(key).ok_or_else(|| TranslationError::missing(key))?;
        decode_value(key, value)
    }

    /// Decode an optional top-level section, defaulting when absent or null.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` at `key` if the section is present but invalid.
    pub fn section_or_default<S: DeserializeOwned + Default>(&self, key: &str) -> Result<S> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(S::default()),
            Some(value) => decode_value(key, value),
        }
    }

    /// Decode the `items` of a list document, validating each one.
    ///
    /// Items inherit `apiVersion` from the list and `kind` from `T` when they
    /// omit them, as list responses usually do. A missing `items` array is
    /// an empty list.
    ///
    /// # Errors
    ///
    /// Returns the first invalid item's error, with its path prefixed by
    /// `items[<index>]`.
    pub fn decode_items<T: Document>(&self) -> Result<Vec<T>> {
        let api_version = self.required_str("apiVersion")?;
        let items = match self.0.get("items") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(TranslationError::mismatch(
                    "items",
                    "array",
                    format!("found {}", json_type(other)),
                ))
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let prefix = format!("items[{index}]");
                let Value::Object(fields) = item else {
                    return Err(TranslationError::mismatch(
                        prefix,
                        "object",
                        format!("found {}", json_type(item)),
                    ));
                };
                let mut fields = fields.clone();
                fields
                    .entry("apiVersion")
                    .or_insert_with(|| Value::String(api_version.to_string()));
                fields
                    .entry("kind")
                    .or_insert_with(|| Value::String(T::KIND.kind().to_string()));
                Self(fields).decode::<T>().map_err(|e| e.within(&prefix))
            })
            .collect()
    }

    fn required_str(&self, key: &str) -> Result<&str> {
        match self.0.get(key) {
            None | Some(Value::Null) => Err(TranslationError::missing(key)),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(TranslationError::mismatch(
                key,
                "string",
                format!("found {}", json_type(other)),
            )),
        }
    }
}

/// A decoded document tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedDoc {
    /// An `IotDevice` document.
    Device(IotDevice),
    /// An `IotPod` document.
    Pod(IotPod),
    /// An `IotDaemonSet` document.
    DaemonSet(IotDaemonSet),
}

impl TypedDoc {
    /// The kind of the decoded document.
    #[must_use]
    pub const fn kind(&self) -> IotKind {
        match self {
            Self::Device(_) => IotKind::Device,
            Self::Pod(_) => IotKind::Pod,
            Self::DaemonSet(_) => IotKind::DaemonSet,
        }
    }
}

impl Document for IotDevice {
    const KIND: IotKind = IotKind::Device;

    fn from_doc(doc: &UntypedDoc) -> Result<Self> {
        Ok(Self {
            types: doc.type_meta(),
            metadata: doc.section("metadata")?,
            spec: doc.section_or_default("spec")?,
            status: doc.section_or_default("status")?,
        })
    }
}

impl Document for IotPod {
    const KIND: IotKind = IotKind::Pod;

    fn from_doc(doc: &UntypedDoc) -> Result<Self> {
        Ok(Self {
            types: doc.type_meta(),
            metadata: doc.section("metadata")?,
            spec: doc.section_or_default("spec")?,
            status: doc.section_or_default("status")?,
        })
    }
}

impl Document for IotDaemonSet {
    const KIND: IotKind = IotKind::DaemonSet;

    fn from_doc(doc: &UntypedDoc) -> Result<Self> {
        Ok(Self {
            types: doc.type_meta(),
            metadata: doc.section("metadata")?,
            spec: doc.section_or_default("spec")?,
        })
    }
}

/// Decode one top-level section, reporting failures at the full field path
/// (e.g. `spec.containers[0].name`).
fn decode_value<S: DeserializeOwned>(key: &str, value: &Value) -> Result<S> {
    serde_path_to_error::deserialize(value).map_err(|e| {
        let path = match e.path().to_string() {
            inner if inner == "." => key.to_string(),
            inner if inner.starts_with('[') => format!("{key}{inner}"),
            inner => format!("{key}.{inner}"),
        };
        TranslationError::mismatch(path, "valid section", e.into_inner().to_string())
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
