use crate::metadata::MetadataSet;
use prost_reflect::MethodDescriptor;
use std::time::Duration;

/// A request object encapsulating all necessary information to perform a dynamic gRPC call.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// The fully qualified method name (e.g., `my.package.Service.Method`).
    pub method: String,
    /// The JSON body of the request.
    pub body: Vec<u8>,
    /// Custom gRPC metadata (headers) to attach to the request.
    pub headers: MetadataSet,
    /// Deadline for the call itself.
    pub timeout: Option<Duration>,
}

impl CallRequest {
    pub fn new(method: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: method.into(),
            body: body.into(),
            headers: MetadataSet::new(),
            timeout: None,
        }
    }

    pub fn with_headers(mut self, headers: MetadataSet) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What the `response` of a [`CallOutput`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The method's output message.
    Message,
    /// A `google.rpc.Status` the server failed the call with.
    Status(tonic::Code),
}

/// The result of a dynamic gRPC call.
#[derive(Debug, Clone)]
pub struct CallOutput {
    /// The method that was invoked.
    pub method: MethodDescriptor,
    /// The request as it was sent, with every field spelled out.
    pub request: serde_json::Value,
    /// The response message, or the error status.
    pub response: serde_json::Value,
    pub outcome: Outcome,
    /// Metadata received before the response message.
    pub headers: MetadataSet,
    /// Metadata received after the response message.
    pub trailers: MetadataSet,
}
