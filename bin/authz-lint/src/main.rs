mod logger;

use std::env;
use std::process;
use std::sync::Arc;

use authz_config::{load_manifest, manifest_json_schema};
use authz_middleware::manifest::{bind_manifest, GrantedRules, ManifestPolicy};
use authz_middleware::resolution::{FieldResult, Resolution};
use authz_middleware::Resolver;
use serde_json::Value;
use tracing::{info, warn};

use crate::logger::configure_logging;

fn null_resolver(_operation: &str) -> Arc<dyn Resolver<GrantedRules>> {
    Arc::new(|_: &Resolution<GrantedRules>| -> FieldResult { Ok(Value::Null) })
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--print-schema") {
        match serde_json::to_string_pretty(&manifest_json_schema()) {
            Ok(schema) => println!("{}", schema),
            Err(err) => {
                eprintln!("failed to serialize manifest schema: {}", err);
                process::exit(1);
            }
        }
        return;
    }

    if args.len() > 1 {
        eprintln!("Usage: authz-lint [--print-schema] [manifest_path]");
        process::exit(2);
    }

    let manifest_path = args
        .into_iter()
        .next()
        .or_else(|| env::var("AUTHZ_MANIFEST_PATH").ok());

    let manifest = match load_manifest(manifest_path) {
        Ok(manifest) => manifest,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
    configure_logging(&manifest.log);

    let policy = ManifestPolicy::from_config(&manifest.policy);
    let composed = bind_manifest(&manifest, null_resolver)
        .and_then(|schema| schema.compose(&policy));

    match composed {
        Ok(operations) => {
            for operation in operations.keys() {
                println!("ok {}", operation);
            }
            info!(operations = operations.len(), "manifest is valid");
        }
        Err(err) => {
            warn!(error = %err, "manifest is invalid");
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
