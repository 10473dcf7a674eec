//! Unpacking the inputs of a [`RunFunctionRequest`].

use deployfn_core::{Codec, CodecError, Composite, DesiredComposed, DesiredComposedResources, Document, RunFunctionRequest};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("{what} is missing")]
    Missing { what: String },
    #[error("{what} is not an object")]
    NotAnObject { what: String },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

fn as_document<'a>(v: &'a Value, what: impl FnOnce() -> String) -> Result<Option<&'a Document>, ExtractError> {
    match v {
        Value::Object(m) => Ok(Some(m)),
        Value::Null => Ok(None),
        _ => Err(ExtractError::NotAnObject { what: what() }),
    }
}

const OBSERVED_COMPOSITE: &str = "observed composite resource";

/// The observed composite resource. The host must always send one; an
/// absent or null composite is an extraction error.
pub fn observed_composite<C: Codec>(codec: &C, req: &RunFunctionRequest) -> Result<Composite, ExtractError> {
    let doc = req
        .observed
        .composite
        .as_ref()
        .map(|xr| as_document(&xr.resource, || OBSERVED_COMPOSITE.to_string()))
        .transpose()?
        .flatten()
        .ok_or_else(|| ExtractError::Missing { what: OBSERVED_COMPOSITE.to_string() })?;
    Ok(codec.decode(doc)?)
}

/// Desired composed resources accumulated by earlier pipeline steps.
pub fn desired_composed<C: Codec>(codec: &C, req: &RunFunctionRequest) -> Result<DesiredComposedResources, ExtractError> {
    let mut out = DesiredComposedResources::new();
    for (name, r) in req.desired.resources.iter() {
        let resource = match as_document(&r.resource, || format!("desired resource {:?}", name))? {
            Some(doc) => codec.decode::<Document>(doc)?,
            None => Document::new(),
        };
        out.insert(name.clone(), DesiredComposed { resource, ready: r.ready });
    }
    Ok(out)
}
