use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    ///  Make the operation more talkative
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        action = ArgAction::Count
    )]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run parallel latency measurement cycles against a payload server
    Bench(BenchArgs),
    /// Serve synthetic payloads over HTTP/2 + TLS
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct BenchArgs {
    /// The server address, like localhost:3443
    #[arg(
        short = 's',
        long = "server",
        value_name = "host:port",
        default_value = "localhost:3443"
    )]
    pub server: String,
    /// Number of parallel measurement cycles
    #[arg(
        short = 'p',
        long = "parallel",
        value_name = "count",
        default_value_t = 1
    )]
    pub parallel: usize,
    /// Payload variant to request, 1-based
    #[arg(
        short = 'n',
        long = "exper-number",
        value_name = "selector",
        default_value_t = 1
    )]
    pub experiment: usize,
    /// The pem path for the trusted root certificate
    #[arg(short = 'c', long)]
    pub certificate_path_option: Option<PathBuf>,
    /// Allow insecure server connections
    #[arg(short = 'k', long = "insecure")]
    pub skip_certificate_validate: bool,
    /// The metrics log to append one row per completed cycle
    #[arg(
        short = 'm',
        long = "metrics-log",
        value_name = "file",
        default_value = "metrics.csv"
    )]
    pub metrics_log: PathBuf,
    /// Upload a random body of this many bytes instead of a plain GET
    #[arg(
        short = 'd',
        long = "upload-bytes",
        value_name = "bytes",
        default_value_t = 0
    )]
    pub upload_bytes: usize,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address, like localhost:3443
    #[arg(
        short = 'l',
        long = "listen",
        value_name = "host:port",
        default_value = "localhost:3443"
    )]
    pub listen: String,
    /// Base payload size; variants scale it by 1x/2x/4x/8x
    #[arg(
        short = 'b',
        long = "bytes",
        value_name = "bytes",
        default_value_t = 1_000_000
    )]
    pub bytes: usize,
    /// The pem path for the server certificate chain
    #[arg(long = "cert", value_name = "file", default_value = "keys/cert.pem")]
    pub cert: PathBuf,
    /// The pem path for the server private key
    #[arg(long = "key", value_name = "file", default_value = "keys/priv.key")]
    pub key: PathBuf,
}
