use std::fmt;
use std::time::{Duration, Instant};

use crate::error::MetricsError;
use crate::timing::Timeline;

/// Number of columns in a metrics log row.
pub const FIELD_COUNT: usize = 9;

/// Phase durations derived from one completed timeline.
///
/// A phase is `None` when one of its events was never observed, e.g. the
/// TLS pair on a plaintext transport. Every present duration is
/// non-negative; a would-be-negative difference fails the whole
/// derivation instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseMetrics {
    pub dns_lookup: Option<Duration>,
    pub tcp_connect: Option<Duration>,
    pub tls_handshake: Option<Duration>,
    pub server_processing: Option<Duration>,
    pub content_transfer: Option<Duration>,
    pub connect: Option<Duration>,
    pub pre_transfer: Option<Duration>,
    pub start_transfer: Option<Duration>,
    pub total: Option<Duration>,
}

impl PhaseMetrics {
    pub fn from_timeline(timeline: &Timeline) -> Result<Self, MetricsError> {
        Ok(Self {
            dns_lookup: phase("dns-lookup", timeline.dns_done(), timeline.dns_start())?,
            tcp_connect: phase(
                "tcp-connect",
                timeline.conn_acquired(),
                timeline.conn_requested(),
            )?,
            tls_handshake: phase("tls-handshake", timeline.tls_done(), timeline.tls_start())?,
            server_processing: phase(
                "server-processing",
                timeline.first_byte(),
                timeline.conn_acquired(),
            )?,
            content_transfer: phase(
                "content-transfer",
                timeline.response_done(),
                timeline.conn_acquired(),
            )?,
            connect: phase("connect", timeline.connect_done(), timeline.dns_done())?,
            pre_transfer: phase(
                "pre-transfer",
                timeline.conn_acquired(),
                timeline.dns_start(),
            )?,
            start_transfer: phase(
                "start-transfer",
                timeline.first_byte(),
                timeline.dns_start(),
            )?,
            total: phase("total", timeline.response_done(), timeline.conn_requested())?,
        })
    }

    /// Cells for one log row, in the fixed column order. Absent phases
    /// become an explicit zero duration so every row carries all nine
    /// fields.
    pub fn row_cells(&self) -> [String; FIELD_COUNT] {
        [
            self.dns_lookup,
            self.tcp_connect,
            self.tls_handshake,
            self.server_processing,
            self.content_transfer,
            self.connect,
            self.pre_transfer,
            self.start_transfer,
            self.total,
        ]
        .map(duration_cell)
    }
}

fn phase(
    name: &'static str,
    end: Option<Instant>,
    start: Option<Instant>,
) -> Result<Option<Duration>, MetricsError> {
    match (end, start) {
        (Some(end), Some(start)) => match end.checked_duration_since(start) {
            Some(duration) => Ok(Some(duration)),
            None => Err(MetricsError::NonMonotonic { phase: name }),
        },
        _ => Ok(None),
    }
}

fn duration_cell(value: Option<Duration>) -> String {
    format!("{:?}", value.unwrap_or(Duration::ZERO))
}

impl fmt::Display for PhaseMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nTime breakdown:")?;
        for (label, value) in [
            ("DNS lookup:", self.dns_lookup),
            ("TCP/connect:", self.tcp_connect),
            ("TLS handshake:", self.tls_handshake),
            ("Server processing:", self.server_processing),
            ("Content transfer:", self.content_transfer),
            ("Connect:", self.connect),
            ("Pre-transfer:", self.pre_transfer),
            ("Start-transfer:", self.start_transfer),
            ("Total:", self.total),
        ] {
            match value {
                Some(duration) => {
                    writeln!(f, "  {label:<19}{:>12}", format!("{duration:?}"))?;
                }
                None => writeln!(f, "  {label:<19}{:>12}", "n/a")?,
            }
        }
        Ok(())
    }
}
