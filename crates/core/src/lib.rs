//! deployfn core types: the function request/response envelope, dynamic
//! resource documents and the codec used to move between typed and dynamic
//! representations.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod codec;
pub mod fieldpath;

pub use codec::{Codec, CodecError, JsonCodec};
pub use fieldpath::{FieldError, FieldErrorReason};

/// Untyped resource document (a JSON object).
pub type Document = serde_json::Map<String, Value>;

/// Desired composed resources keyed by logical name. Ordered so that
/// serialized output is stable.
pub type DesiredComposedResources = BTreeMap<String, DesiredComposed>;

// ---- wire envelope ----

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Ready {
    #[default]
    #[serde(rename = "READY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "READY_TRUE")]
    True,
    #[serde(rename = "READY_FALSE")]
    False,
}

impl Ready {
    fn is_unspecified(&self) -> bool { matches!(self, Ready::Unspecified) }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    #[serde(rename = "SEVERITY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "SEVERITY_FATAL")]
    Fatal,
    #[serde(rename = "SEVERITY_WARNING")]
    Warning,
    #[serde(rename = "SEVERITY_NORMAL")]
    Normal,
}

/// A resource as carried by the envelope. `resource` is expected to be a
/// JSON object; that is checked when the request is unpacked, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default)]
    pub resource: Value,
    /// Connection secret values, base64 encoded as in the protobuf JSON mapping.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub connection_details: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Ready::is_unspecified")]
    pub ready: Ready,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Resource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, Resource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunFunctionRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    #[serde(default)]
    pub observed: State,
    #[serde(default)]
    pub desired: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Duration in protobuf JSON form, e.g. `"60s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionResult {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunFunctionResponse {
    #[serde(default)]
    pub meta: ResponseMeta,
    #[serde(default)]
    pub desired: State,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FunctionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl RunFunctionResponse {
    /// The first fatal result, if the run failed.
    pub fn first_fatal(&self) -> Option<&FunctionResult> {
        self.results.iter().find(|r| r.severity == Severity::Fatal)
    }

    pub fn is_fatal(&self) -> bool { self.first_fatal().is_some() }
}

// ---- dynamic resources ----

/// Observed composite resource, readable without a fixed schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Composite(DynamicObject);

impl Composite {
    pub fn api_version(&self) -> &str {
        self.0.types.as_ref().map(|t| t.api_version.as_str()).unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.0.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("")
    }

    pub fn name(&self) -> &str { self.0.metadata.name.as_deref().unwrap_or("") }

    pub fn namespace(&self) -> Option<&str> { self.0.metadata.namespace.as_deref() }

    /// Read a string at a dotted path (e.g. `spec.image`) in the object's content.
    pub fn get_string(&self, path: &str) -> Result<String, FieldError> {
        fieldpath::get_string(&self.0.data, path)
    }
}

/// A desired composed resource: a document plus its readiness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredComposed {
    pub resource: Document,
    pub ready: Ready,
}

impl DesiredComposed {
    pub fn new(resource: Document) -> Self { Self { resource, ready: Ready::Unspecified } }
}

pub mod prelude {
    pub use super::{
        Codec, Composite, DesiredComposed, DesiredComposedResources, Document, FunctionResult, JsonCodec,
        Ready, RunFunctionRequest, RunFunctionResponse, Severity,
    };
}
