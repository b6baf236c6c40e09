//! # CLI
//!
//! This module defines the command-line interface of `grpcurl` using `clap`.
//!
//! Header specs are taken verbatim here; splitting them into `key: value` pairs (and skipping the
//! malformed ones) is left to the metadata codec.
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "grpcurl",
    version,
    about = "Call gRPC methods with JSON, discovering schemas through server reflection"
)]
pub struct Cli {
    /// Use plaintext HTTP/2 instead of TLS
    #[arg(short = 'k', long, global = true)]
    pub insecure: bool,

    /// Print the request, the response headers and the response trailer too
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Seconds to wait for the connection to be established
    #[arg(
        long,
        global = true,
        env = "GRPCURL_CONNECT_TIMEOUT",
        value_parser = parse_seconds
    )]
    pub connect_timeout: Option<Duration>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List services and methods provided by a gRPC server
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grpcurl ls localhost:8888
    /// grpcurl ls -l localhost:8888 my.package.Service
    /// ```
    #[command(name = "list_services", visible_alias = "ls")]
    ListServices(ListServicesArgs),

    /// Call a unary gRPC method with a JSON body read from stdin
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// echo '{"value": "hello"}' | grpcurl -k call localhost:8888 my.package.Service.Method
    /// ```
    Call(CallArgs),
}

#[derive(Args, Debug)]
pub struct ListServicesArgs {
    /// Server address (host:port)
    pub addr: String,

    /// Fully qualified service name whose methods should be listed
    pub service: Option<String>,

    /// Print the request and response types of every method
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Server address (host:port)
    pub addr: String,

    /// Fully qualified method name (e.g. my.package.Service.Method)
    pub method: String,

    /// Request metadata as "key: value"
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Seconds the call may take before it is cancelled
    #[arg(long, value_parser = parse_seconds)]
    pub max_time: Option<Duration>,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("'{value}' is not a valid number of seconds"));
    }

    Ok(Duration::from_secs_f64(seconds))
}
