use std::collections::HashMap;

use tracing::info;
use tracing_subscriber::EnvFilter;

use sitecrawl::coordinator;
use sitecrawl::AppState;

struct RunArgs {
    domains: Vec<String>,
    per_site_cap: usize,
    concurrency: usize,
    global_target: Option<usize>,
}

fn parse_args() -> RunArgs {
    let mut domains = Vec::new();
    let mut per_site_cap = 10usize;
    let mut concurrency = 3usize;
    let mut global_target = None;

    let mut args = std::env::args().skip(1).peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--per-site-cap" => {
                if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                    per_site_cap = v;
                }
            }
            "--concurrency" => {
                if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                    concurrency = v;
                }
            }
            "--global-target" => {
                global_target = args.next().and_then(|v| v.parse().ok());
            }
            other => domains.push(other.to_string()),
        }
    }

    if domains.is_empty() {
        if let Ok(v) = std::env::var("CRAWL_DOMAINS") {
            domains = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
    }

    RunArgs { domains, per_site_cap, concurrency, global_target }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let args = parse_args();
    if args.domains.is_empty() {
        eprintln!("usage: sitecrawl <domain>... [--per-site-cap N] [--concurrency N] [--global-target N]");
        std::process::exit(2);
    }

    info!(domains = ?args.domains, per_site_cap = args.per_site_cap, concurrency = args.concurrency, "starting crawl run");

    let state = AppState::build();
    let deps = state.coordinator_deps();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let run = coordinator::run(args.domains, args.per_site_cap, args.concurrency, args.global_target, HashMap::new(), deps, None, shutdown_rx);
    tokio::pin!(run);

    let summary = tokio::select! {
        summary = &mut run => summary,
        _ = shutdown_signal() => {
            info!("shutdown signal received, winding down in-flight batches");
            let _ = shutdown_tx.send(true);
            run.await
        }
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize run summary: {err}"),
    }
}
