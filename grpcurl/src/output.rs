//! # Output
//!
//! Text rendering of command results. Everything goes to the writer handed in by the caller,
//! one line per item, so the output can be parsed by scripts.
use grpcurl_core::client::CallOutput;
use grpcurl_core::metadata::MetadataSet;
use grpcurl_core::prost_reflect::MethodDescriptor;
use std::io::{self, Write};

pub const REQUEST_MARKER: &str = "==> Request Message";
pub const RESPONSE_MARKER: &str = "<== Response Message";
pub const HEADERS_MARKER: &str = "<== Response Headers";
pub const TRAILER_MARKER: &str = "<== Response Trailer";

/// `Full.Method(streaming In) return (Out)`
pub fn method_signature(method: &MethodDescriptor) -> String {
    let streaming = |enabled: bool| if enabled { "streaming " } else { "" };

    format!(
        "{}({}{}) return ({}{})",
        method.full_name(),
        streaming(method.is_client_streaming()),
        method.input().full_name(),
        streaming(method.is_server_streaming()),
        method.output().full_name(),
    )
}

pub fn write_methods<W: Write>(
    out: &mut W,
    methods: impl IntoIterator<Item = MethodDescriptor>,
    long: bool,
) -> io::Result<()> {
    for method in methods {
        if long {
            writeln!(out, "{}", method_signature(&method))?;
        } else {
            writeln!(out, "{}", method.full_name())?;
        }
    }
    Ok(())
}

pub fn write_call<W: Write>(out: &mut W, output: &CallOutput, verbose: bool) -> io::Result<()> {
    if verbose {
        writeln!(out, "{REQUEST_MARKER}")?;
        writeln!(out, "{}", output.request)?;
        writeln!(out, "{RESPONSE_MARKER}")?;
    }

    writeln!(out, "{}", output.response)?;

    if verbose {
        writeln!(out, "{HEADERS_MARKER}")?;
        write_metadata(out, &output.headers)?;
        writeln!(out, "{TRAILER_MARKER}")?;
        write_metadata(out, &output.trailers)?;
    }

    Ok(())
}

fn write_metadata<W: Write>(out: &mut W, metadata: &MetadataSet) -> io::Result<()> {
    for line in metadata.format_lines() {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
