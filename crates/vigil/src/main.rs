use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vigil::browser::RemoteBrowser;
use vigil::dispatch;
use vigil::server::{BridgeServer, ServerHandle};
use vigil_engine::browser;
use vigil_engine::config::ConfigStore;
use vigil_engine::coordinator::Coordinator;
use vigil_engine::exam::ExamContext;
use vigil_engine::reporter::HttpSink;

#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Assessment monitoring service")]
struct Args {
    /// WebSocket port the page bridge connects to
    #[arg(short, long, default_value_t = 9777)]
    port: u16,

    /// Path of the persisted monitoring config
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Exam host authority (host[:port]); repeat for multiple
    #[arg(long = "exam-host")]
    exam_hosts: Vec<String>,

    /// Seconds between probe cycles
    #[arg(long, default_value_t = 10)]
    probe_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr; stdout stays clean for whoever wraps the service.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let store = ConfigStore::new(args.config_path.or_else(ConfigStore::default_path));
    store.load().await;

    let server = BridgeServer::new(args.port);
    let ServerHandle {
        outbound_tx,
        inbound_rx,
        query_rx,
    } = server.start().await?;
    println!(
        "Please connect the page bridge to ws://localhost:{}",
        args.port
    );

    let remote = RemoteBrowser::new(outbound_tx.clone(), query_rx);
    let exam = if args.exam_hosts.is_empty() {
        ExamContext::default()
    } else {
        ExamContext::new(args.exam_hosts)
    };
    let coordinator = Coordinator::new(
        browser::shared(remote),
        store,
        exam,
        Arc::new(HttpSink::new()),
    )
    .with_probe_interval(Duration::from_secs(args.probe_interval_secs));

    tokio::select! {
        _ = dispatch::run(coordinator, inbound_rx, outbound_tx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    Ok(())
}
