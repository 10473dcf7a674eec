//! Conversion between typed Kubernetes objects and dynamic documents.
//!
//! A codec is passed explicitly to every conversion; there is no shared
//! registry of known types.

#![forbid(unsafe_code)]

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::Document;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cannot encode {type_name}: {source}")]
    Encode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot decode {type_name}: {source}")]
    Decode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{type_name} did not encode to an object")]
    NotAnObject { type_name: &'static str },
}

/// Encoder/decoder pair between typed values and [`Document`]s.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Document, CodecError>;
    fn decode<T: DeserializeOwned>(&self, doc: &Document) -> Result<T, CodecError>;
}

/// Codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Document, CodecError> {
        let type_name = std::any::type_name::<T>();
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CodecError::NotAnObject { type_name }),
            Err(source) => Err(CodecError::Encode { type_name, source }),
        }
    }

    fn decode<T: DeserializeOwned>(&self, doc: &Document) -> Result<T, CodecError> {
        serde_json::from_value(Value::Object(doc.clone()))
            .map_err(|source| CodecError::Decode { type_name: std::any::type_name::<T>(), source })
    }
}
