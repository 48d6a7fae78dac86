//! `devora-gate [PATH...]`: print the gate decision for each path as JSON.

use std::sync::Arc;

use anyhow::Context;

use devora_auth::explain;
use devora_client::api::{HttpSessionVerifier, http_client};
use devora_client::{Access, ClientConfig};
use devora_session::SessionStore;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    devora_observability::init();

    let config = ClientConfig::from_env().context("reading configuration")?;
    let routes = config.route_table().context("loading route table")?;
    let storage = config
        .credential_store()
        .context("opening credential storage")?;
    let http = http_client(config.http_timeout).context("building http client")?;

    let verifier = HttpSessionVerifier::new(http, config.api_url.clone());
    let store = SessionStore::with_key(
        Arc::new(verifier),
        Arc::new(storage),
        config.credential_key.clone(),
    );
    let session = store.initialize().await;

    let paths: Vec<String> = match std::env::args().skip(1).collect::<Vec<_>>() {
        args if args.is_empty() => routes.patterns().map(|p| p.as_str().to_string()).collect(),
        args => args,
    };

    for path in paths {
        let report = match routes.resolve(&path) {
            None => serde_json::json!({ "path": path, "route": "not_found" }),
            Some(Access::Public) => serde_json::json!({ "path": path, "route": "public" }),
            Some(Access::Protected(requirement)) => {
                let explanation = explain(&session, &requirement);
                let redirect = config.redirects.target(explanation.outcome, &path);
                serde_json::json!({
                    "path": path,
                    "route": "protected",
                    "decision": explanation,
                    "redirect": redirect,
                })
            }
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    Ok(())
}
