use std::io;
use std::path::PathBuf;

use hyper::StatusCode;
use thiserror::Error;

/// Fault raised by the metrics calculator when a phase would come out
/// negative. The measurement is discarded, never persisted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsError {
    #[error("phase '{phase}' ends before it starts; the event order is broken")]
    NonMonotonic { phase: &'static str },
}

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("cannot open metrics log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot append to metrics log: {0}")]
    Append(#[from] io::Error),
    #[error("metrics log writer is poisoned")]
    Poisoned,
}

/// Everything that can end a single measurement cycle. One worker failing
/// with any of these leaves its siblings running.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("failed to resolve {authority}: {source}")]
    Resolve {
        authority: String,
        #[source]
        source: io::Error,
    },
    #[error("unable to connect to {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: io::Error,
    },
    #[error("TLS handshake with {authority} failed: {source}")]
    Handshake {
        authority: String,
        #[source]
        source: io::Error,
    },
    #[error("http/2 exchange failed: {0}")]
    Http(#[from] hyper::Error),
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),
    #[error("server answered {status}")]
    BadStatus { status: StatusCode },
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error(transparent)]
    Record(#[from] RecorderError),
}
