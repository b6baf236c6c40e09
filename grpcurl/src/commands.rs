//! # Commands
//!
//! Drives one invocation of a subcommand: connect, run it through the dynamic client and write
//! the result. Input and output are generic so tests can run commands against in-memory buffers.
use crate::cli::{CallArgs, Cli, Commands, ListServicesArgs};
use crate::output;
use anyhow::Context;
use grpcurl_core::client::{CallRequest, DynamicClient, Outcome};
use grpcurl_core::connection::ConnectOptions;
use grpcurl_core::metadata::MetadataSet;
use std::io::{Read, Write};

#[cfg(test)]
mod integration_test;

pub async fn run<R: Read, W: Write>(cli: Cli, input: R, out: &mut W) -> anyhow::Result<()> {
    let options = ConnectOptions {
        insecure: cli.insecure,
        connect_timeout: cli.connect_timeout,
    };

    match cli.command {
        Commands::ListServices(args) => list_services(args, &options, out).await?,
        Commands::Call(args) => call(args, &options, cli.verbose, input, out).await?,
    }

    out.flush().context("Failed to write output")
}

async fn connect(addr: &str, options: &ConnectOptions) -> anyhow::Result<DynamicClient> {
    DynamicClient::connect(addr, options)
        .await
        .context("Connection failed")
}

async fn list_services<W: Write>(
    args: ListServicesArgs,
    options: &ConnectOptions,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut client = connect(&args.addr, options).await?;

    match args.service {
        Some(service) => {
            let service = client
                .resolve_service(&service)
                .await
                .with_context(|| format!("Failed to resolve service '{service}'"))?;

            output::write_methods(out, service.methods(), args.long)?;
        }
        None => {
            let services = client
                .list_services()
                .await
                .context("Failed to list services")?;

            for service in services {
                writeln!(out, "{service}")?;
            }
        }
    }

    Ok(())
}

async fn call<R: Read, W: Write>(
    args: CallArgs,
    options: &ConnectOptions,
    verbose: bool,
    mut input: R,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut body = Vec::new();
    input
        .read_to_end(&mut body)
        .context("Failed to read the request body from stdin")?;

    let mut request = CallRequest::new(args.method.as_str(), body)
        .with_headers(MetadataSet::parse_header_specs(&args.headers));

    if let Some(timeout) = args.max_time {
        request = request.with_timeout(timeout);
    }

    let mut client = connect(&args.addr, options).await?;

    let result = client
        .call(request)
        .await
        .with_context(|| format!("Failed to call '{}'", args.method))?;

    if let Outcome::Status(code) = result.outcome {
        tracing::debug!(?code, method = %args.method, "server returned an error status");
    }

    output::write_call(out, &result, verbose)?;

    Ok(())
}
