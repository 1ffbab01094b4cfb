use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::header::{HOST, SET_COOKIE};
use serde_json::{json, Value};

use edge_router::config::{load_config, RouterConfig};
use edge_router::http::{EdgeCache, EdgeRequest, Fetch, HttpOrigin};
use edge_router::lifecycle::startup;
use edge_router::middlewares::Catalog;
use edge_router::routing::{tables, Site};

#[derive(Parser)]
#[command(name = "edge-router-cli")]
#[command(about = "Inspect edge router configuration and routing", long_about = None)]
struct Cli {
    /// Router config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config and build every site table
    Check,
    /// Show the site and middleware chain a URL would run through
    Explain {
        url: String,
        /// Include the local reroutes used in testing mode
        #[arg(long)]
        local: bool,
    },
    /// Send a GET through a running router and show what came back
    Probe {
        url: String,
        #[arg(short, long, default_value = "http://localhost:8080")]
        router: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };

    match cli.command {
        Commands::Check => {
            let catalog = catalog(config.clone())?;
            let registrations = startup::self_check(&catalog)?;
            print_json(&json!({
                "stage": config.environment.stage.as_str(),
                "sites": Site::ALL.iter().map(Site::as_str).collect::<Vec<_>>(),
                "registrations": registrations,
            }))?;
        }
        Commands::Explain { url, local } => {
            let request = EdgeRequest::get(&url)?;
            let site = Site::select(&request, &config.sites);
            let registrations = tables::build(site, &catalog(config)?, local)?;
            let path = request.path();

            let request_chain: Vec<Value> = registrations
                .matching_request(path)
                .map(|r| json!({ "pattern": r.pattern(), "middleware": r.middleware().iter().map(|m| m.name()).collect::<Vec<_>>() }))
                .collect();
            let mut response_chain = Vec::new();
            for r in registrations.matching_response(path) {
                response_chain.push(json!({
                    "pattern": r.pattern(),
                    "middleware": r.middleware().iter().map(|m| m.name()).collect::<Vec<_>>(),
                    "early_return": r.is_early_return(),
                }));
                if r.is_early_return() {
                    break;
                }
            }
            print_json(&json!({
                "site": site.as_str(),
                "request": request_chain,
                "response": response_chain,
            }))?;
        }
        Commands::Probe { url, router } => {
            let target = url::Url::parse(&url)?;
            let host = match target.port() {
                Some(port) => format!("{}:{port}", target.host_str().unwrap_or_default()),
                None => target.host_str().unwrap_or_default().to_string(),
            };
            let path = match target.query() {
                Some(query) => format!("{}?{query}", target.path()),
                None => target.path().to_string(),
            };

            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()?;
            let res = client
                .get(format!("{}{path}", router.trim_end_matches('/')))
                .header(HOST, host)
                .header("x-forwarded-proto", target.scheme())
                .send()
                .await?;

            let cookies: Vec<&str> = res
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            print_json(&json!({
                "status": res.status().as_u16(),
                "content_type": res.headers().get("content-type").and_then(|v| v.to_str().ok()),
                "set_cookie": cookies,
            }))?;
        }
    }

    Ok(())
}

fn catalog(config: RouterConfig) -> Result<Catalog, Box<dyn std::error::Error>> {
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpOrigin::new(&config.origins, &config.timeouts)?);
    let cache = EdgeCache::new(fetcher.clone(), Duration::from_secs(30));
    Ok(Catalog::new(Arc::new(config), fetcher, cache))
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
