//! deployfn transform engine: derive a Deployment from an observed composite
//! resource and add it to the desired composed resources.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use deployfn_core::{Codec, CodecError, Composite, DesiredComposed, DesiredComposedResources, FieldError};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use tracing::{debug, info, info_span};

/// Key the synthesized Deployment is stored under in the desired resources.
pub const DEPLOYMENT_KEY: &str = "deployment";
pub const REPLICAS: i32 = 2;
pub const IMAGE_FIELD: &str = "spec.image";
pub const TAG_FIELD: &str = "spec.tag";

/// Field errors collected while validating a composite, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    /// Paths of the fields that failed, e.g. `["spec.tag"]`.
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    fn describe_fields(&self) -> String {
        let noun = if self.0.len() == 1 { "field" } else { "fields" };
        format!("{} {}", self.fields().join(", "), noun)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 { f.write_str("; ")?; }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// One or more required fields are missing or not strings.
    #[error("cannot read {} of {kind}: {errors}", .errors.describe_fields())]
    FieldRead { kind: String, errors: FieldErrors },
    #[error("cannot convert Deployment to a desired composed resource: {source}")]
    Conversion {
        #[source]
        source: CodecError,
    },
}

/// Image reference parameters read from the composite's spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub image: String,
    pub tag: String,
}

impl ImageRef {
    /// Validate `spec.image` and `spec.tag` together so every bad field is
    /// reported at once. Empty strings are accepted.
    pub fn from_composite(xr: &Composite) -> Result<Self, FieldErrors> {
        let image = xr.get_string(IMAGE_FIELD);
        let tag = xr.get_string(TAG_FIELD);
        match (image, tag) {
            (Ok(image), Ok(tag)) => Ok(Self { image, tag }),
            (image, tag) => Err(FieldErrors(
                [image.err(), tag.err()].into_iter().flatten().collect(),
            )),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.image, self.tag)
    }
}

fn app_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

/// Build the Deployment for a composite named `name`.
pub fn build_deployment(name: &str, namespace: Option<&str>, image: &ImageRef) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(REPLICAS),
            selector: LabelSelector { match_labels: Some(app_labels(name)), ..Default::default() },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(app_labels(name)), ..Default::default() }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.to_string(),
                        image: Some(image.to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Synthesize the Deployment for `observed` and store it in `desired` under
/// [`DEPLOYMENT_KEY`], replacing any previous entry. Other entries are left
/// alone. On error `desired` is not modified.
pub fn synthesize<C: Codec>(
    codec: &C,
    observed: &Composite,
    desired: &mut DesiredComposedResources,
) -> Result<(), SynthesisError> {
    let span = info_span!(
        "synthesize",
        "xr-version" = observed.api_version(),
        "xr-kind" = observed.kind(),
        "xr-name" = observed.name()
    );
    let _guard = span.enter();

    let name = observed.name();
    let image = ImageRef::from_composite(observed).map_err(|errors| SynthesisError::FieldRead {
        kind: observed.kind().to_string(),
        errors,
    })?;

    let deployment = build_deployment(name, observed.namespace(), &image);
    let doc = codec.encode(&deployment).map_err(|source| SynthesisError::Conversion { source })?;

    if desired.insert(DEPLOYMENT_KEY.to_string(), DesiredComposed::new(doc)).is_some() {
        debug!(key = DEPLOYMENT_KEY, "replaced existing desired resource");
    }
    info!(name, container = %image, "Added deploy");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployfn_core::{FieldErrorReason, JsonCodec};

    fn xr(spec: serde_json::Value) -> Composite {
        let doc = serde_json::json!({
            "apiVersion": "example.org/v1",
            "kind": "XApp",
            "metadata": { "name": "web", "namespace": "prod" },
            "spec": spec,
        });
        JsonCodec.decode(doc.as_object().unwrap()).unwrap()
    }

    #[test]
    fn image_ref_reports_all_bad_fields() {
        let errs = ImageRef::from_composite(&xr(serde_json::json!({ "image": 7 }))).unwrap_err();
        assert_eq!(errs.fields(), vec!["spec.image", "spec.tag"]);
        assert_eq!(errs.0[0].reason, FieldErrorReason::NotAString);
        assert_eq!(errs.0[1].reason, FieldErrorReason::NotFound);
    }

    #[test]
    fn field_read_message_names_fields_and_kind() {
        let mut desired = DesiredComposedResources::new();
        let err = synthesize(&JsonCodec, &xr(serde_json::json!({ "image": "nginx" })), &mut desired).unwrap_err();
        assert_eq!(err.to_string(), "cannot read spec.tag field of XApp: spec.tag: no such field");

        let err = synthesize(&JsonCodec, &xr(serde_json::json!({})), &mut desired).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot read spec.image, spec.tag fields of XApp: spec.image: no such field; spec.tag: no such field"
        );
    }

    #[test]
    fn build_deployment_omits_empty_namespace() {
        let image = ImageRef { image: "nginx".into(), tag: "1".into() };
        let d = build_deployment("web", Some(""), &image);
        assert_eq!(d.metadata.namespace, None);
        let d = build_deployment("web", None, &image);
        assert_eq!(d.metadata.name.as_deref(), Some("web"));
        assert_eq!(d.metadata.namespace, None);
    }

    #[test]
    fn replaces_previous_deployment_entry() {
        let mut desired = DesiredComposedResources::new();
        desired.insert(DEPLOYMENT_KEY.to_string(), DesiredComposed::default());
        synthesize(&JsonCodec, &xr(serde_json::json!({ "image": "nginx", "tag": "1.25" })), &mut desired).unwrap();
        assert_eq!(desired.len(), 1);
        assert_eq!(desired[DEPLOYMENT_KEY].resource["kind"], "Deployment");
    }
}
