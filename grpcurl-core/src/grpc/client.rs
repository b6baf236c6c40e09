//! # Generic gRPC Client
//!
//! This module wraps a standard `tonic` client to invoke any unary method given only its
//! [`MethodDescriptor`].
//!
//! ## How it works
//!
//! The [`GrpcClient`] uses [`super::codec::DynamicCodec`] to put the request on the wire and to
//! decode the response with the method's output schema. The HTTP/2 path
//! (`/package.Service/Method`) is built at runtime from the descriptor.
//!
//! The call goes through `tonic`'s server-streaming entry point, which is wire-identical to a
//! unary call but exposes the response headers, the message and the trailers separately.
//!
//! A status sent by the server is not an error: it becomes an [`Invocation`] whose body is a
//! `google.rpc.Status` message. Only failures where no usable response arrived are errors.
use super::codec::DynamicCodec;
use super::status::{StatusSchemaError, is_transport_failure, status_message};
use crate::BoxError;
use crate::metadata::MetadataSet;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::str::FromStr;
use std::time::Duration;
use tonic::{Code, Status, client::GrpcService, transport::Channel};

#[derive(thiserror::Error, Debug)]
pub enum InvocationError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),

    #[error("Method '{0}' is a streaming method, only unary methods can be invoked")]
    StreamingNotSupported(String),

    #[error("Invalid gRPC path for method '{0}'")]
    InvalidPath(String),

    #[error("Transport failure: '{0}'")]
    Transport(#[source] Status),

    #[error("The server closed the call without sending a response message")]
    MissingResponse,

    #[error(transparent)]
    StatusSchema(#[from] StatusSchemaError),
}

/// The response body of a completed call.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    /// The method's output message.
    Message(DynamicMessage),
    /// A `google.rpc.Status` message describing a failure reported by the server.
    Status {
        code: Code,
        message: DynamicMessage,
    },
}

impl ResponseBody {
    pub fn message(&self) -> &DynamicMessage {
        match self {
            Self::Message(message) => message,
            Self::Status { message, .. } => message,
        }
    }
}

/// Everything the server sent back for one call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub body: ResponseBody,
    pub headers: MetadataSet,
    pub trailers: MetadataSet,
}

impl Invocation {
    fn from_status(status: Status, headers: MetadataSet) -> Result<Self, InvocationError> {
        let responded = !headers.is_empty();

        if is_transport_failure(&status, responded) {
            return Err(InvocationError::Transport(status));
        }

        tracing::debug!(code = ?status.code(), "server returned an error status");

        Ok(Self {
            body: ResponseBody::Status {
                code: status.code(),
                message: status_message(&status)?,
            },
            headers,
            trailers: MetadataSet::from(status.metadata()),
        })
    }
}

/// A generic client that invokes methods described by a [`MethodDescriptor`].
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }

    /// Performs a unary call.
    ///
    /// # Returns
    ///
    /// * `Ok(Invocation)` - The server answered, either with a message or with a status.
    /// * `Err(InvocationError)` - The method is streaming, or no usable response arrived.
    pub async fn invoke(
        &mut self,
        method: &MethodDescriptor,
        payload: DynamicMessage,
        metadata: &MetadataSet,
        timeout: Option<Duration>,
    ) -> Result<Invocation, InvocationError> {
        if method.is_client_streaming() || method.is_server_streaming() {
            return Err(InvocationError::StreamingNotSupported(
                method.full_name().to_string(),
            ));
        }

        self.client
            .ready()
            .await
            .map_err(|e| InvocationError::ClientNotReady(e.into()))?;

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method)?;

        let mut request = tonic::Request::new(payload);
        metadata.apply_to(request.metadata_mut());
        if let Some(timeout) = timeout {
            request.set_timeout(timeout);
        }

        let response = match self.client.server_streaming(request, path, codec).await {
            Ok(response) => response,
            Err(status) => return Invocation::from_status(status, MetadataSet::new()),
        };

        let (headers, mut stream, _) = response.into_parts();
        let headers = MetadataSet::from(&headers);

        let message = match stream.message().await {
            Ok(Some(message)) => message,
            Ok(None) => return Err(InvocationError::MissingResponse),
            Err(status) => return Invocation::from_status(status, headers),
        };

        let trailers = match stream.trailers().await {
            Ok(trailers) => trailers
                .map(|trailers| MetadataSet::from(&trailers))
                .unwrap_or_default(),
            Err(status) => return Invocation::from_status(status, headers),
        };

        Ok(Invocation {
            body: ResponseBody::Message(message),
            headers,
            trailers,
        })
    }
}

fn http_path(method: &MethodDescriptor) -> Result<http::uri::PathAndQuery, InvocationError> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path)
        .map_err(|_| InvocationError::InvalidPath(method.full_name().to_string()))
}
