use clap::Parser;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::bench::driver::run_benchmark;
use crate::cli::app_config::{Cli, Command};
use crate::payload::store::PayloadStore;
use crate::server::handler::PayloadServer;
use crate::tls::server::load_server_config;

pub async fn main_with_error() -> Result<(), anyhow::Error> {
    let cli: Cli = Cli::parse();
    init_tracing(cli.verbosity)?;

    match cli.command {
        Command::Bench(args) => {
            let report = run_benchmark(&args).await?;
            ensure!(
                report.failed == 0,
                "{} of {} measurement cycle(s) failed",
                report.failed,
                report.completed + report.failed
            );
            Ok(())
        }
        Command::Serve(args) => {
            let tls_config = load_server_config(&args.cert, &args.key)?;
            let store = PayloadStore::generate(args.bytes);
            let server = PayloadServer::bind(&args.listen, tls_config, store).await?;
            server.serve().await
        }
    }
}

fn init_tracing(verbosity: u8) -> Result<(), anyhow::Error> {
    let log_level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy()
        .add_directive("h2=off".parse()?)
        .add_directive("rustls=off".parse()?);
    let subscriber = tracing_subscriber::fmt()
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_max_level(log_level)
        .with_env_filter(filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}
