use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::USER_AGENT;
use hyper::{Method, Request, StatusCode, Version};
use hyper_util::rt::{TokioExecutor, TokioIo};
use pki_types::ServerName;
use rand::RngCore;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::error::CycleError;
use crate::metrics::calculator::PhaseMetrics;
use crate::metrics::recorder::MetricsRecorder;
use crate::server::handler::BODY_SIZE_HEADER;
use crate::timing::Timeline;

/// Everything a measurement cycle shares with its siblings. Built once by
/// the driver; workers only clone cheap handles out of it.
pub struct CycleContext {
    pub host: String,
    pub port: u16,
    pub experiment: usize,
    pub upload_bytes: usize,
    pub tls_config: Arc<ClientConfig>,
    pub server_name: ServerName<'static>,
    pub recorder: Arc<MetricsRecorder>,
}

impl CycleContext {
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug)]
pub struct MeasurementOutcome {
    pub worker: usize,
    pub version: Version,
    pub method: Method,
    pub status: StatusCode,
    pub body_len: usize,
    pub declared_len: Option<u64>,
    pub metrics: PhaseMetrics,
}

/// One full measurement: resolve, dial, handshake, exchange, derive the
/// phase durations and append the log row. Every fallible step maps to a
/// typed per-cycle error; nothing here ends the process.
pub async fn run_cycle(
    ctx: Arc<CycleContext>,
    worker: usize,
) -> Result<MeasurementOutcome, CycleError> {
    let authority = ctx.authority();
    let timeline = Timeline::new();
    timeline.mark_conn_requested();

    timeline.mark_dns_start();
    let addrs: Vec<_> = tokio::net::lookup_host((ctx.host.as_str(), ctx.port))
        .await
        .map_err(|source| CycleError::Resolve {
            authority: authority.clone(),
            source,
        })?
        .collect();
    timeline.mark_dns_done();

    let mut stream = None;
    let mut last_err = None;
    for addr in addrs {
        timeline.mark_connect_start();
        match TcpStream::connect(addr).await {
            Ok(connected) => {
                stream = Some(connected);
                break;
            }
            Err(err) => {
                debug!("worker {worker}: connect attempt to {addr} failed: {err}");
                last_err = Some(err);
            }
        }
    }
    let stream = match stream {
        Some(stream) => stream,
        None => {
            let source = last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            });
            return Err(CycleError::Connect { authority, source });
        }
    };
    timeline.mark_connect_done();

    let connector = TlsConnector::from(ctx.tls_config.clone());
    timeline.mark_tls_start();
    let tls_stream = connector
        .connect(ctx.server_name.clone(), stream)
        .await
        .map_err(|source| CycleError::Handshake {
            authority: authority.clone(),
            source,
        })?;
    timeline.mark_tls_done();

    let (mut sender, conn) =
        hyper::client::conn::http2::handshake(TokioExecutor::new(), TokioIo::new(tls_stream))
            .await?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!("worker {worker}: connection task ended: {err}");
        }
    });
    timeline.mark_conn_acquired();

    let request = build_request(&ctx)?;
    let method = request.method().clone();

    let response = sender.send_request(request).await?;
    timeline.mark_first_byte();

    let (parts, body) = response.into_parts();
    let collected = body.collect().await?.to_bytes();
    timeline.mark_response_done();

    if !parts.status.is_success() {
        return Err(CycleError::BadStatus {
            status: parts.status,
        });
    }

    let declared_len = parts
        .headers
        .get(BODY_SIZE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let metrics = PhaseMetrics::from_timeline(&timeline)?;
    ctx.recorder.append(&metrics)?;

    Ok(MeasurementOutcome {
        worker,
        version: parts.version,
        method,
        status: parts.status,
        body_len: collected.len(),
        declared_len,
        metrics,
    })
}

fn build_request(ctx: &CycleContext) -> Result<Request<Full<Bytes>>, CycleError> {
    let uri = format!("https://{}:{}/{}", ctx.host, ctx.port, ctx.experiment);
    let builder = Request::builder()
        .uri(uri)
        .header(USER_AGENT, concat!("h2bench/", env!("CARGO_PKG_VERSION")));

    // A non-zero upload size turns the cycle into a POST carrying a
    // random body, so upstream transfer cost shows up in the phases too.
    let request = if ctx.upload_bytes > 0 {
        let mut buf = vec![0u8; ctx.upload_bytes];
        rand::thread_rng().fill_bytes(&mut buf);
        builder
            .method(Method::POST)
            .body(Full::new(Bytes::from(buf)))?
    } else {
        builder.method(Method::GET).body(Full::new(Bytes::new()))?
    };
    Ok(request)
}
