//! Building a [`RunFunctionResponse`].

use std::time::Duration;

use deployfn_core::{Codec, CodecError, DesiredComposedResources, FunctionResult, RunFunctionRequest, RunFunctionResponse, Severity};
use serde_json::Value;

/// Format a duration the way the protobuf JSON mapping does: `"60s"`, `"1.5s"`.
pub fn format_ttl(d: Duration) -> String {
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        return format!("{}s", d.as_secs());
    }
    let frac = format!("{:09}", nanos);
    format!("{}.{}s", d.as_secs(), frac.trim_end_matches('0'))
}

/// Start a response for `req`: echo the tag, carry over desired state and
/// context, and set the cache TTL.
pub fn to(req: &RunFunctionRequest, ttl: Duration) -> RunFunctionResponse {
    let mut rsp = RunFunctionResponse::default();
    rsp.meta.tag = req.meta.tag.clone();
    rsp.meta.ttl = Some(format_ttl(ttl));
    rsp.desired = req.desired.clone();
    rsp.context = req.context.clone();
    rsp
}

/// Attach a fatal result carrying the error message.
pub fn fatal(rsp: &mut RunFunctionResponse, err: &dyn std::error::Error) {
    rsp.results.push(FunctionResult { severity: Severity::Fatal, message: err.to_string() });
}

/// Write desired composed resources into the response. Entries not in
/// `desired` are kept. Nothing is written unless every entry encodes.
pub fn set_desired_composed_resources<C: Codec>(
    codec: &C,
    rsp: &mut RunFunctionResponse,
    desired: DesiredComposedResources,
) -> Result<(), CodecError> {
    let encoded = desired
        .into_iter()
        .map(|(name, dc)| Ok((name, codec.encode(&dc.resource)?, dc.ready)))
        .collect::<Result<Vec<_>, CodecError>>()?;
    for (name, doc, ready) in encoded {
        let entry = rsp.desired.resources.entry(name).or_default();
        entry.resource = Value::Object(doc);
        entry.ready = ready;
    }
    Ok(())
}
