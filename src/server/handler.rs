use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use crate::payload::store::PayloadStore;

/// Response header naming the exact body byte length.
pub const BODY_SIZE_HEADER: &str = "x-body-size";

/// HTTP/2-over-TLS server answering `/<selector>` paths with the matching
/// payload variant. Stateless after startup; every connection task shares
/// the same immutable store handle.
pub struct PayloadServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    acceptor: TlsAcceptor,
    store: Arc<PayloadStore>,
}

impl PayloadServer {
    pub async fn bind(
        listen: &str,
        tls_config: ServerConfig,
        store: PayloadStore,
    ) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("cannot bind {listen}"))?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            acceptor: TlsAcceptor::from(Arc::new(tls_config)),
            store: Arc::new(store),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve(self) -> Result<(), anyhow::Error> {
        info!(
            "serving payload variants of {:?} bytes on {}",
            self.store.sizes(),
            self.local_addr
        );
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let acceptor = self.acceptor.clone();
            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(err) = serve_connection(acceptor, store, stream, peer).await {
                    debug!("connection from {peer} ended: {err}");
                }
            });
        }
    }
}

async fn serve_connection(
    acceptor: TlsAcceptor,
    store: Arc<PayloadStore>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), anyhow::Error> {
    let tls_stream = acceptor.accept(stream).await?;
    hyper::server::conn::http2::Builder::new(TokioExecutor::new())
        .serve_connection(
            TokioIo::new(tls_stream),
            service_fn(move |req| {
                let store = store.clone();
                async move { handle_request(&store, req, peer).await }
            }),
        )
        .await?;
    Ok(())
}

async fn handle_request(
    store: &PayloadStore,
    req: Request<Incoming>,
    peer: SocketAddr,
) -> Result<Response<Full<Bytes>>, anyhow::Error> {
    debug!(
        "{:?} {} {} from {peer}",
        req.version(),
        req.method(),
        req.uri().path()
    );
    let path = req.uri().path().to_string();
    // Upload cycles carry a synthetic body; drain it before answering.
    req.into_body().collect().await?;
    Ok(payload_response(store, &path)?)
}

/// Maps a request path to a payload response. A malformed or out-of-range
/// selector is rejected per-request with 400; it never takes the server
/// down.
pub fn payload_response(
    store: &PayloadStore,
    path: &str,
) -> Result<Response<Full<Bytes>>, http::Error> {
    match parse_selector(path) {
        Some(selector) => match store.get(selector) {
            Some(body) => Response::builder()
                .status(StatusCode::OK)
                .header(BODY_SIZE_HEADER, body.len())
                .body(Full::new(body)),
            None => {
                warn!(
                    "selector {selector} is out of range (1..={})",
                    store.len()
                );
                reject(format!(
                    "selector {selector} is out of range (1..={})\n",
                    store.len()
                ))
            }
        },
        None => {
            warn!("request path {path:?} does not name a payload selector");
            reject(format!(
                "request path {path:?} does not name a payload selector\n"
            ))
        }
    }
}

fn parse_selector(path: &str) -> Option<usize> {
    let raw = path.strip_prefix('/')?;
    let selector: usize = raw.parse().ok()?;
    (selector >= 1).then_some(selector)
}

fn reject(message: String) -> Result<Response<Full<Bytes>>, http::Error> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(Full::new(Bytes::from(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_len(response: Response<Full<Bytes>>) -> usize {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
            .len()
    }

    #[tokio::test]
    async fn valid_selector_returns_the_variant_and_its_size() {
        let store = PayloadStore::generate(10);
        let response = payload_response(&store, "/3").expect("build response");

        assert_eq!(response.status(), StatusCode::OK);
        let declared = response
            .headers()
            .get(BODY_SIZE_HEADER)
            .expect("size header")
            .to_str()
            .expect("ascii header")
            .to_string();
        assert_eq!(declared, "40");
        assert_eq!(body_len(response).await, 40);
    }

    #[tokio::test]
    async fn out_of_range_selector_is_rejected_per_request() {
        let store = PayloadStore::generate(10);
        let response = payload_response(&store, "/5").expect("build response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn zero_and_junk_selectors_are_rejected() {
        let store = PayloadStore::generate(10);
        for path in ["/0", "/abc", "/", "/-1", "/1.5"] {
            let response = payload_response(&store, path).expect("build response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "path {path}");
        }
    }
}
