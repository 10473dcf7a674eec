//! deployfn runtime adapter.
//!
//! Wraps the transform engine in the composition function request/response
//! contract: unpack the request, run the engine, and report any failure as a
//! single fatal result. Transport (gRPC, TLS) is left to the host.

#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use deployfn_core::{Codec, CodecError, JsonCodec, RunFunctionRequest, RunFunctionResponse};
use deployfn_synth::SynthesisError;
use metrics::{counter, histogram};
use tracing::{debug, warn};

pub mod request;
pub mod response;

pub use request::ExtractError;

/// Default response cache TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfig {
    /// How long the caller may cache the response.
    pub ttl: Duration,
}

impl Default for FunctionConfig {
    fn default() -> Self { Self { ttl: DEFAULT_TTL } }
}

#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("cannot get observed composite resource from RunFunctionRequest: {0}")]
    ObservedComposite(#[source] ExtractError),
    #[error("cannot get desired resources from RunFunctionRequest: {0}")]
    DesiredResources(#[source] ExtractError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error("cannot set desired composed resources in RunFunctionResponse: {0}")]
    SetDesired(#[source] CodecError),
}

/// Entry point a host runtime calls once per request.
pub trait FunctionRunner: Send + Sync {
    fn run_function(&self, req: &RunFunctionRequest) -> RunFunctionResponse;
}

/// The deployment function. Holds only immutable configuration, so one
/// instance can serve concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct Function<C = JsonCodec> {
    codec: C,
    config: FunctionConfig,
}

impl Function<JsonCodec> {
    pub fn new(config: FunctionConfig) -> Self { Self { codec: JsonCodec, config } }
}

impl<C: Codec> Function<C> {
    pub fn with_codec(codec: C, config: FunctionConfig) -> Self { Self { codec, config } }

    fn apply(&self, req: &RunFunctionRequest, rsp: &mut RunFunctionResponse) -> Result<(), FunctionError> {
        let xr = request::observed_composite(&self.codec, req).map_err(FunctionError::ObservedComposite)?;
        let mut desired = request::desired_composed(&self.codec, req).map_err(FunctionError::DesiredResources)?;
        deployfn_synth::synthesize(&self.codec, &xr, &mut desired)?;
        response::set_desired_composed_resources(&self.codec, rsp, desired).map_err(FunctionError::SetDesired)
    }
}

impl<C: Codec> FunctionRunner for Function<C> {
    fn run_function(&self, req: &RunFunctionRequest) -> RunFunctionResponse {
        let started = Instant::now();
        counter!("function_runs_total", 1u64);
        debug!(tag = %req.meta.tag, desired = req.desired.resources.len(), "running function");

        let mut rsp = response::to(req, self.config.ttl);
        if let Err(e) = self.apply(req, &mut rsp) {
            counter!("function_fatal_total", 1u64);
            warn!(error = %e, "function run failed");
            response::fatal(&mut rsp, &e);
        }
        histogram!("function_run_ms", started.elapsed().as_secs_f64() * 1000.0);
        rsp
    }
}
