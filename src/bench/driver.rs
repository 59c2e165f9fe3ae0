use std::sync::Arc;

use anyhow::Context;
use pki_types::ServerName;
use tokio::task::JoinSet;

use crate::cli::app_config::BenchArgs;
use crate::error::CycleError;
use crate::http::handler::{run_cycle, CycleContext, MeasurementOutcome};
use crate::metrics::recorder::MetricsRecorder;
use crate::server::handler::BODY_SIZE_HEADER;
use crate::tls::client::build_client_config;

pub struct BenchReport {
    pub completed: usize,
    pub failed: usize,
}

/// Launches the requested number of measurement cycles and returns once
/// every one of them has finished, successfully or not. A failing cycle
/// is reported and counted; its siblings keep running.
pub async fn run_benchmark(args: &BenchArgs) -> Result<BenchReport, anyhow::Error> {
    let ctx = Arc::new(build_context(args)?);
    info!(
        "running {} measurement cycle(s) against {}",
        args.parallel,
        ctx.authority()
    );

    let results = run_cycles(ctx, args.parallel).await;

    let mut completed = 0;
    for (worker, result) in &results {
        match result {
            Ok(outcome) => {
                completed += 1;
                print_summary(outcome);
            }
            Err(err) => error!("worker {worker}: measurement failed: {err}"),
        }
    }
    // Panicked workers never reach the results list, so count failures
    // against the requested parallelism, not against what came back.
    Ok(BenchReport {
        completed,
        failed: args.parallel - completed,
    })
}

pub fn build_context(args: &BenchArgs) -> Result<CycleContext, anyhow::Error> {
    ensure!(args.parallel >= 1, "parallelism must be at least 1");
    ensure!(args.experiment >= 1, "experiment selector must be at least 1");

    let (host, port) = split_authority(&args.server)?;
    let tls_config = build_client_config(
        args.certificate_path_option.as_deref(),
        args.skip_certificate_validate,
    )?;
    let server_name = ServerName::try_from(host.clone())
        .with_context(|| format!("{host} is not a valid server name"))?;
    let recorder = MetricsRecorder::create(&args.metrics_log)?;

    Ok(CycleContext {
        host,
        port,
        experiment: args.experiment,
        upload_bytes: args.upload_bytes,
        tls_config: Arc::new(tls_config),
        server_name,
        recorder: Arc::new(recorder),
    })
}

/// Fans the cycles out on the runtime and drains the join set. Results
/// carry the worker index so failures stay attributable.
pub async fn run_cycles(
    ctx: Arc<CycleContext>,
    parallel: usize,
) -> Vec<(usize, Result<MeasurementOutcome, CycleError>)> {
    let mut join_set = JoinSet::new();
    for worker in 0..parallel {
        let ctx = ctx.clone();
        join_set.spawn(async move { (worker, run_cycle(ctx, worker).await) });
    }

    let mut results = Vec::with_capacity(parallel);
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(entry) => results.push(entry),
            Err(err) => error!("worker task aborted: {err}"),
        }
    }
    results
}

fn split_authority(server: &str) -> Result<(String, u16), anyhow::Error> {
    let (host, port) = server
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("server address {server:?} is not host:port"))?;
    ensure!(!host.is_empty(), "server address {server:?} has no host");
    let port = port
        .parse::<u16>()
        .with_context(|| format!("server address {server:?} has no valid port"))?;
    Ok((host.to_string(), port))
}

fn print_summary(outcome: &MeasurementOutcome) {
    println!("\nProtocol: {:?} {}", outcome.version, outcome.method);
    println!("Code: {}", outcome.status.as_u16());
    match outcome.declared_len {
        Some(declared) => {
            println!("Body: {} bytes ({BODY_SIZE_HEADER}: {declared})", outcome.body_len);
            if declared != outcome.body_len as u64 {
                warn!(
                    "declared body size {declared} does not match the {} bytes transferred",
                    outcome.body_len
                );
            }
        }
        None => println!(
            "Body: {} bytes (no {BODY_SIZE_HEADER} header)",
            outcome.body_len
        ),
    }
    print!("{}", outcome.metrics);
    println!("-----------------------------------------");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_a_host_port_authority() {
        let (host, port) = split_authority("localhost:3443").expect("valid authority");
        assert_eq!(host, "localhost");
        assert_eq!(port, 3443);
    }

    #[test]
    fn rejects_addresses_without_a_port() {
        assert!(split_authority("localhost").is_err());
        assert!(split_authority(":3443").is_err());
        assert!(split_authority("localhost:notaport").is_err());
    }
}
