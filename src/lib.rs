#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate tracing;

pub mod app;
pub mod bench;
pub mod cli;
pub mod error;
pub mod http;
pub mod metrics;
pub mod payload;
pub mod server;
pub mod timing;
pub mod tls;
