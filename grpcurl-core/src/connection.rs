//! # Connection
//!
//! Opens the HTTP/2 channel every other component talks through.
//!
//! A bare `host:port` address is reached over TLS, verified against the platform's native root
//! certificates. With `insecure` set it is reached over plaintext HTTP/2 instead. Addresses that
//! already carry a scheme are used as given.
use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid address '{0}': {1}")]
    InvalidAddress(String, #[source] tonic::transport::Error),
    #[error("Failed to configure TLS for '{0}': {1}")]
    Tls(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Use plaintext HTTP/2 instead of TLS.
    pub insecure: bool,
    /// Upper bound for establishing the connection.
    pub connect_timeout: Option<Duration>,
}

/// Connects eagerly so an unreachable server is reported before anything else happens.
pub async fn connect(addr: &str, options: &ConnectOptions) -> Result<Channel, ConnectError> {
    let uri = target_uri(addr, options.insecure);

    let mut endpoint = Endpoint::new(uri.clone())
        .map_err(|e| ConnectError::InvalidAddress(addr.to_string(), e))?;

    if let Some(timeout) = options.connect_timeout {
        endpoint = endpoint.connect_timeout(timeout);
    }

    if uri.starts_with("https://") {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_native_roots())
            .map_err(|e| ConnectError::Tls(addr.to_string(), e))?;
    }

    tracing::debug!(uri, "connecting");

    endpoint
        .connect()
        .await
        .map_err(|e| ConnectError::ConnectionFailed(addr.to_string(), e))
}

fn target_uri(addr: &str, insecure: bool) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else if insecure {
        format!("http://{addr}")
    } else {
        format!("https://{addr}")
    }
}
