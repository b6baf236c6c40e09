//! # Reflection Client
//!
//! A client for the gRPC Server Reflection Protocol.
//!
//! This client turns service and method names into descriptors by querying a server that
//! supports reflection. It handles dependency management by inspecting the imports of every
//! returned file and fetching the missing ones until the schema tree of the requested symbol is
//! complete.
//!
//! `grpc.reflection.v1` is tried first. Servers that only implement the older
//! `grpc.reflection.v1alpha` answer `UNIMPLEMENTED`, in which case the client switches to it.
//! Both versions share the same message definitions, only the RPC path differs.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use crate::grpc::status::is_transport_failure;
use http::uri::PathAndQuery;
use http_body::Body as HttpBody;
use prost::Message;
use prost_reflect::{DescriptorError, DescriptorPool, MethodDescriptor, ServiceDescriptor};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::client::GrpcService;
use tonic::transport::Channel;
use tonic::{Code, Status, Streaming};
use tonic_prost::ProstCodec;
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error("Invalid method name '{0}', expected '<package>.<Service>.<Method>'")]
    InvalidMethodName(String),

    #[error("Service '{0}' not found")]
    ServiceNotFound(String),

    #[error("Method '{method}' not found in service '{service}'")]
    MethodNotFound { service: String, method: String },

    #[error("The server does not support the reflection API: '{0}'")]
    Unavailable(#[source] Status),

    #[error("Failed to reach the reflection service: '{0}'")]
    Transport(#[source] Status),

    #[error("The reflection stream returned an error status: '{0}'")]
    StreamFailure(#[source] Status),

    #[error("Reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("Internal error: Failed to send request to stream")]
    SendFailed,

    #[error("Server returned reflection error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Protocol error: Received unexpected response type: {0}")]
    UnexpectedResponse(String),

    #[error("Failed to decode FileDescriptorProto: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Failed to build a descriptor pool from the reflected files: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// Version of the reflection service a server answered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionProtocol {
    V1,
    V1Alpha,
}

impl ReflectionProtocol {
    fn path(self) -> PathAndQuery {
        match self {
            Self::V1 => PathAndQuery::from_static(
                "/grpc.reflection.v1.ServerReflection/ServerReflectionInfo",
            ),
            Self::V1Alpha => PathAndQuery::from_static(
                "/grpc.reflection.v1alpha.ServerReflection/ServerReflectionInfo",
            ),
        }
    }
}

// The host defined in the reflection requests doesn't seem to be a mandatory field
// and there is no documentation about what it is about.
// So we won't enforce it from the user.
const EMPTY_HOST: &str = "";

const REQUEST_BUFFER: usize = 100;

/// A generic client for the gRPC Server Reflection Protocol.
pub struct ReflectionClient<S = Channel> {
    client: tonic::client::Grpc<S>,
    protocol: Option<ReflectionProtocol>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self {
            client,
            protocol: None,
        }
    }

    /// The reflection version negotiated with the server, if any exchange happened yet.
    pub fn protocol(&self) -> Option<ReflectionProtocol> {
        self.protocol
    }

    /// Lists the fully-qualified names of all services exposed by the server, in server order.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        let (_requests, mut response_stream) = self
            .open_stream(MessageRequest::ListServices(String::new()))
            .await?;

        match next_response(&mut response_stream).await? {
            MessageResponse::ListServicesResponse(resp) => {
                let services = resp.service.into_iter().map(|s| s.name).collect();
                Ok(services)
            }
            MessageResponse::ErrorResponse(e) => Err(ReflectionError::ServerError {
                code: e.error_code,
                message: e.error_message,
            }),
            other => Err(ReflectionError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    /// Asks the reflection service for the file containing the requested symbol
    /// (e.g., `my.package.MyService`) and every file it transitively imports.
    pub async fn file_descriptor_set_by_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<FileDescriptorSet, ReflectionError> {
        let (requests, mut response_stream) = self
            .open_stream(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await?;

        let file_map = collect_descriptors(&mut response_stream, requests).await?;

        tracing::debug!(symbol, files = file_map.len(), "collected file descriptors");

        Ok(FileDescriptorSet {
            file: file_map.into_values().collect(),
        })
    }

    /// Resolves a fully-qualified service name into its descriptor.
    ///
    /// A fresh reflection exchange is performed on every call.
    pub async fn resolve_service(
        &mut self,
        service_name: &str,
    ) -> Result<ServiceDescriptor, ReflectionError> {
        let fd_set = self
            .file_descriptor_set_by_symbol(service_name)
            .await
            .map_err(|err| match err {
                ReflectionError::StreamFailure(status) if status.code() == Code::NotFound => {
                    ReflectionError::ServiceNotFound(service_name.to_string())
                }
                ReflectionError::ServerError { code, .. } if code == Code::NotFound as i32 => {
                    ReflectionError::ServiceNotFound(service_name.to_string())
                }
                err => err,
            })?;

        let pool = DescriptorPool::from_file_descriptor_set(fd_set)?;

        pool.get_service_by_name(service_name)
            .ok_or_else(|| ReflectionError::ServiceNotFound(service_name.to_string()))
    }

    /// Resolves `package.Service.Method` (or `package.Service/Method`) into a method descriptor.
    pub async fn resolve_method(
        &mut self,
        full_name: &str,
    ) -> Result<MethodDescriptor, ReflectionError> {
        let (service_name, method_name) = split_method_name(full_name)?;
        let service = self.resolve_service(service_name).await?;

        let method = service
            .methods()
            .find(|method| method.name() == method_name)
            .ok_or_else(|| ReflectionError::MethodNotFound {
                service: service_name.to_string(),
                method: method_name.to_string(),
            })?;

        tracing::debug!(method = method.full_name(), "resolved method");

        Ok(method)
    }

    /// Opens a reflection stream with `first` already queued.
    ///
    /// The request is enqueued before the call starts because some servers only send response
    /// headers once they have answered the first request.
    async fn open_stream(
        &mut self,
        first: MessageRequest,
    ) -> Result<
        (
            mpsc::Sender<ServerReflectionRequest>,
            Streaming<ServerReflectionResponse>,
        ),
        ReflectionError,
    > {
        let candidates = match self.protocol {
            Some(protocol) => vec![protocol],
            None => vec![ReflectionProtocol::V1, ReflectionProtocol::V1Alpha],
        };

        let mut unimplemented = None;

        for protocol in candidates {
            let (tx, rx) = mpsc::channel(REQUEST_BUFFER);

            tx.send(reflection_request(first.clone()))
                .await
                .map_err(|_| ReflectionError::SendFailed)?;

            self.client
                .ready()
                .await
                .map_err(|e| ReflectionError::Transport(Status::from_error(e.into())))?;

            let codec = ProstCodec::<ServerReflectionRequest, ServerReflectionResponse>::default();
            let request = tonic::Request::new(ReceiverStream::new(rx));

            match self.client.streaming(request, protocol.path(), codec).await {
                Ok(response) => {
                    self.protocol = Some(protocol);
                    return Ok((tx, response.into_inner()));
                }
                Err(status) if status.code() == Code::Unimplemented => {
                    tracing::debug!(?protocol, "reflection protocol not implemented by server");
                    unimplemented = Some(status);
                }
                Err(status) if is_transport_failure(&status, false) => {
                    return Err(ReflectionError::Transport(status));
                }
                Err(status) => return Err(ReflectionError::StreamFailure(status)),
            }
        }

        Err(ReflectionError::Unavailable(unimplemented.unwrap_or_else(
            || Status::unimplemented("no reflection protocol available"),
        )))
    }
}

/// Splits a method name at its last separator into `(service, method)`.
///
/// The separator is the last `/` when present, otherwise the last `.`.
pub fn split_method_name(full_name: &str) -> Result<(&str, &str), ReflectionError> {
    let name = full_name.strip_prefix('/').unwrap_or(full_name);

    let split = match name.rfind('/') {
        Some(index) => Some((&name[..index], &name[index + 1..])),
        None => name.rsplit_once('.'),
    };

    match split {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Ok((service, method))
        }
        _ => Err(ReflectionError::InvalidMethodName(full_name.to_string())),
    }
}

fn reflection_request(message_request: MessageRequest) -> ServerReflectionRequest {
    ServerReflectionRequest {
        host: EMPTY_HOST.to_string(),
        message_request: Some(message_request),
    }
}

async fn next_response(
    response_stream: &mut Streaming<ServerReflectionResponse>,
) -> Result<MessageResponse, ReflectionError> {
    let response = response_stream
        .message()
        .await
        .map_err(|status| {
            if is_transport_failure(&status, true) {
                ReflectionError::Transport(status)
            } else {
                ReflectionError::StreamFailure(status)
            }
        })?
        .ok_or(ReflectionError::StreamClosed)?;

    response
        .message_response
        .ok_or_else(|| ReflectionError::UnexpectedResponse("Empty Message".into()))
}

async fn collect_descriptors(
    response_stream: &mut Streaming<ServerReflectionResponse>,
    request_channel: mpsc::Sender<ServerReflectionRequest>,
) -> Result<HashMap<String, FileDescriptorProto>, ReflectionError> {
    let mut inflight = 1;
    let mut collected_files = HashMap::new();
    let mut requested = HashSet::new();

    while inflight > 0 {
        let response = next_response(response_stream).await?;

        inflight -= 1;

        match response {
            MessageResponse::FileDescriptorResponse(res) => {
                let sent_count = process_descriptor_batch(
                    res.file_descriptor_proto,
                    &mut collected_files,
                    &mut requested,
                    &request_channel,
                )
                .await?;

                inflight += sent_count;
            }
            MessageResponse::ErrorResponse(e) => {
                return Err(ReflectionError::ServerError {
                    code: e.error_code,
                    message: e.error_message,
                });
            }
            other => {
                return Err(ReflectionError::UnexpectedResponse(format!("{other:?}")));
            }
        }
    }

    Ok(collected_files)
}

async fn process_descriptor_batch(
    raw_protos: Vec<Vec<u8>>,
    collected_files: &mut HashMap<String, FileDescriptorProto>,
    requested: &mut HashSet<String>,
    tx: &mpsc::Sender<ServerReflectionRequest>,
) -> Result<usize, ReflectionError> {
    let mut sent_count = 0;

    for raw in raw_protos {
        let fd = FileDescriptorProto::decode(raw.as_ref())?;

        if let Some(name) = &fd.name
            && !collected_files.contains_key(name)
        {
            sent_count += queue_dependencies(&fd, collected_files, requested, tx).await?;

            collected_files.insert(name.clone(), fd);
        }
    }

    Ok(sent_count)
}

async fn queue_dependencies(
    fd: &FileDescriptorProto,
    collected_files: &HashMap<String, FileDescriptorProto>,
    requested: &mut HashSet<String>,
    tx: &mpsc::Sender<ServerReflectionRequest>,
) -> Result<usize, ReflectionError> {
    let mut count = 0;

    for dep in &fd.dependency {
        if !collected_files.contains_key(dep) && requested.insert(dep.clone()) {
            tx.send(reflection_request(MessageRequest::FileByFilename(
                dep.clone(),
            )))
            .await
            .map_err(|_| ReflectionError::SendFailed)?;

            count += 1;
        }
    }

    Ok(count)
}
