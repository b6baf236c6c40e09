//! # Dynamic Client
//!
//! This module implements the high-level flow of one `grpcurl` invocation.
//!
//! The [`DynamicClient`] owns a [`ReflectionClient`] and a [`GrpcClient`] over the same
//! connection. A call goes through four steps, each one a separate component:
//!
//! 1. Resolve the method name into a descriptor through server reflection.
//! 2. Decode the JSON body into a message of the method's input type.
//! 3. Invoke the method and capture headers, trailers and any error status.
//! 4. Encode the response (or the status) back into JSON.
//!
//! Nothing is cached between calls: every call performs its own reflection exchange.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grpcurl_core::client::{CallRequest, DynamicClient};
//! use grpcurl_core::connection::ConnectOptions;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ConnectOptions { insecure: true, ..Default::default() };
//! let mut client = DynamicClient::connect("localhost:50051", &options).await?;
//!
//! let output = client
//!     .call(CallRequest::new("grpcurl.test.Echo.Echo", br#"{"value":"hi"}"#.to_vec()))
//!     .await?;
//!
//! println!("{}", output.response);
//! # Ok(())
//! # }
//! ```
mod types;

pub use types::*;

use crate::BoxError;
use crate::codec::{CodecError, MessageCodec};
use crate::connection::{self, ConnectError, ConnectOptions};
use crate::grpc::client::{GrpcClient, InvocationError, ResponseBody};
use crate::reflection::client::{ReflectionClient, ReflectionError};
use http_body::Body as HttpBody;
use prost_reflect::{MethodDescriptor, ServiceDescriptor};
use tonic::transport::Channel;

/// Errors that can occur during a dynamic call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Reflection(#[from] ReflectionError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// A client that calls methods of any server exposing the reflection service.
pub struct DynamicClient<S = Channel> {
    reflection_client: ReflectionClient<S>,
    grpc_client: GrpcClient<S>,
}

impl DynamicClient<Channel> {
    /// Connects to `addr` (e.g. `localhost:50051`).
    pub async fn connect(addr: &str, options: &ConnectOptions) -> Result<Self, ConnectError> {
        let channel = connection::connect(addr, options).await?;
        Ok(Self::from_service(channel))
    }
}

impl<S> DynamicClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a client from an existing Tonic service/channel.
    pub fn from_service(service: S) -> Self {
        let reflection_client = ReflectionClient::new(service.clone());
        let grpc_client = GrpcClient::new(service);
        Self {
            reflection_client,
            grpc_client,
        }
    }

    /// Lists services available on the server via Reflection.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        self.reflection_client.list_services().await
    }

    pub async fn resolve_service(
        &mut self,
        service_name: &str,
    ) -> Result<ServiceDescriptor, ReflectionError> {
        self.reflection_client.resolve_service(service_name).await
    }

    pub async fn resolve_method(
        &mut self,
        full_name: &str,
    ) -> Result<MethodDescriptor, ReflectionError> {
        self.reflection_client.resolve_method(full_name).await
    }

    /// Executes a dynamic gRPC call.
    ///
    /// A status returned by the server is part of a successful [`CallOutput`]; only failures to
    /// resolve, decode or reach the server are errors.
    pub async fn call(&mut self, request: CallRequest) -> Result<CallOutput, CallError> {
        let method = self
            .reflection_client
            .resolve_method(&request.method)
            .await?;

        let codec = MessageCodec::new(method.parent_pool().clone());
        let payload = codec.decode(&method.input(), &request.body)?;
        let normalized_request = codec.encode(&payload);

        let invocation = self
            .grpc_client
            .invoke(&method, payload, &request.headers, request.timeout)
            .await?;

        let outcome = match &invocation.body {
            ResponseBody::Message(_) => Outcome::Message,
            ResponseBody::Status { code, .. } => Outcome::Status(*code),
        };

        Ok(CallOutput {
            method,
            request: normalized_request,
            response: codec.encode(invocation.body.message()),
            outcome,
            headers: invocation.headers,
            trailers: invocation.trailers,
        })
    }
}
