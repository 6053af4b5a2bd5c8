use clap::Parser;
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use std::convert::Infallible;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vghw_common::Config;
use vghw_stress::engine::transport::WsDialer;
use vghw_stress::engine::{ERROR_CHANNEL_CAPACITY, REPORT_CHANNEL_CAPACITY};
use vghw_stress::metrics;
use vghw_stress::sweep::{run_sweep, Summary};
use vghw_stress::Fleet;

#[derive(Parser, Debug)]
#[command(name = "vghw-stress")]
#[command(about = "Concurrent client load generator for the VGHW game server", long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, env = "VGHW_STRESS_CONFIG", default_value = "config/vghw_stress.yaml")]
    config: PathBuf,
}

fn init_production_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    info!("Production structured logging initialized (JSON)");
}

async fn metrics_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    match req.uri().path() {
        "/health" => Ok(Response::new(Body::from("OK"))),
        "/metrics" => Ok(Response::new(Body::from(metrics::render_metrics()))),
        _ => {
            let mut not_found = Response::new(Body::from("Not Found"));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

async fn run_metrics_server(port: u16, token: CancellationToken) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics::register_metrics();

    let make_svc =
        make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(metrics_handler)) });

    let server = Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(async move { token.cancelled().await });

    info!(port = port, "Observability server online");

    if let Err(e) = server.await {
        error!(error = %e, "Observability server failed");
    }
}

fn print_report(snapshot: &vghw_stress::Snapshot) {
    let summary = Summary::from_snapshot(snapshot);
    metrics::record_summary(&summary);
    println!("{}", summary);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_production_logging();
    let args = Args::parse();

    let config_data = fs::read_to_string(&args.config)?;
    let config: Config = serde_yaml::from_str(&config_data)?;

    let master_token = CancellationToken::new();

    if config.metrics.enabled {
        let port = config.metrics.port;
        let metrics_token = master_token.clone();
        tokio::spawn(async move {
            run_metrics_server(port, metrics_token).await;
        });
    }

    let (report_tx, mut report_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
    let (error_tx, mut error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

    let dialer = Arc::new(WsDialer::new(&config.target));
    let fleet = Fleet::new(dialer, report_tx, error_tx);
    let phases = config.sweep.phases();

    info!(target_url = %config.target.url, phases = phases.len(), "Starting sweep");

    let sweep_token = master_token.child_token();
    let sweep = run_sweep(&sweep_token, &fleet, &phases);
    tokio::pin!(sweep);

    let completed = loop {
        tokio::select! {
            completed = &mut sweep => break completed,
            Some(snapshot) = report_rx.recv() => print_report(&snapshot),
            Some(err) = error_rx.recv() => {
                if !err.is_expected() {
                    error!(error = %err, "Client error");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                master_token.cancel();
            }
        }
    };

    // The last phase's report may still be buffered.
    while let Ok(snapshot) = report_rx.try_recv() {
        print_report(&snapshot);
    }

    info!(completed, total = phases.len(), "Sweep finished");
    master_token.cancel();
    Ok(())
}
