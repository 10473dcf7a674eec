use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use deployfn_core::{Resource, RunFunctionRequest};
use deployfn_runtime::{Function, FunctionConfig, FunctionRunner};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "deployfnctl", version, about = "Run the deployfn composition function locally")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Yaml)]
    output: Output,

    /// Response cache TTL in seconds
    #[arg(long = "ttl", env = "DEPLOYFN_TTL_SECS", global = true, default_value_t = 60)]
    ttl_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Yaml, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full RunFunctionRequest (JSON or YAML) and print the response
    Render {
        /// Request file; reads stdin when omitted or "-"
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,
    },
    /// Run against a bare composite resource and print the desired resources
    Synth {
        /// Composite resource document
        #[arg(long = "composite")]
        composite: PathBuf,
        /// Map of already desired resources, keyed by name
        #[arg(long = "desired")]
        desired: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env = std::env::var("DEPLOYFN_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))
        }
        _ => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("reading stdin")?;
            Ok(s)
        }
    }
}

/// JSON when the document starts like JSON, YAML otherwise.
fn parse_doc<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed).context("parsing JSON")
    } else {
        serde_yaml::from_str(text).context("parsing YAML")
    }
}

fn emit<T: Serialize>(output: Output, value: &T) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Output::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn synth_request(composite: serde_json::Value, desired: BTreeMap<String, serde_json::Value>) -> RunFunctionRequest {
    let mut req = RunFunctionRequest::default();
    req.observed.composite = Some(Resource { resource: composite, ..Default::default() });
    req.desired.resources = desired
        .into_iter()
        .map(|(name, resource)| (name, Resource { resource, ..Default::default() }))
        .collect();
    req
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let function = Function::new(FunctionConfig { ttl: Duration::from_secs(cli.ttl_secs) });

    match cli.command {
        Commands::Render { input } => {
            let req: RunFunctionRequest = parse_doc(&read_input(input.as_deref())?)?;
            info!(tag = %req.meta.tag, "render invoked");
            let rsp = function.run_function(&req);
            emit(cli.output, &rsp)?;
        }
        Commands::Synth { composite, desired } => {
            let xr: serde_json::Value = parse_doc(&read_input(Some(composite.as_path()))?)?;
            let desired: BTreeMap<String, serde_json::Value> = match desired {
                Some(p) => parse_doc(&read_input(Some(p.as_path()))?)?,
                None => BTreeMap::new(),
            };
            let rsp = function.run_function(&synth_request(xr, desired));
            if let Some(fatal) = rsp.first_fatal() {
                error!(message = %fatal.message, "synth failed");
                return Err(anyhow!(fatal.message.clone()).context("function returned a fatal result"));
            }
            let resources: BTreeMap<_, _> = rsp.desired.resources.into_iter().map(|(k, r)| (k, r.resource)).collect();
            emit(cli.output, &resources)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_doc_accepts_json_and_yaml() {
        let json: serde_json::Value = parse_doc("  {\"kind\": \"XApp\"}").unwrap();
        assert_eq!(json["kind"], "XApp");

        let yaml: serde_json::Value = parse_doc("kind: XApp\nspec:\n  image: nginx\n  tag: '1.25'\n").unwrap();
        assert_eq!(yaml["spec"]["tag"], "1.25");

        let err = parse_doc::<serde_json::Value>("{ nope").unwrap_err();
        assert!(err.to_string().contains("parsing JSON"), "err={err}");
    }

    #[test]
    fn synth_request_wraps_documents() {
        let mut desired = BTreeMap::new();
        desired.insert("cache".to_string(), serde_json::json!({ "kind": "Redis" }));
        let req = synth_request(serde_json::json!({ "kind": "XApp" }), desired);
        assert_eq!(req.observed.composite.unwrap().resource["kind"], "XApp");
        assert_eq!(req.desired.resources["cache"].resource["kind"], "Redis");
    }

    #[test]
    fn synth_request_runs_end_to_end() {
        let xr: serde_json::Value = parse_doc(
            "apiVersion: example.org/v1\nkind: XApp\nmetadata:\n  name: web\n  namespace: prod\nspec:\n  image: nginx\n  tag: '1.25'\n",
        )
        .unwrap();
        let rsp = Function::new(FunctionConfig::default()).run_function(&synth_request(xr, BTreeMap::new()));
        assert!(!rsp.is_fatal());
        assert_eq!(
            rsp.desired.resources["deployment"].resource["spec"]["template"]["spec"]["containers"][0]["image"],
            "nginx:1.25"
        );
    }

    #[test]
    fn synth_request_surfaces_the_fatal_message() {
        let xr = serde_json::json!({ "apiVersion": "example.org/v1", "kind": "XApp", "spec": { "image": "nginx" } });
        let rsp = Function::new(FunctionConfig::default()).run_function(&synth_request(xr, BTreeMap::new()));
        let fatal = rsp.first_fatal().unwrap();
        assert_eq!(fatal.message, "cannot read spec.tag field of XApp: spec.tag: no such field");
    }
}
