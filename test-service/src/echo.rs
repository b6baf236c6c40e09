use crate::pb::EchoMessage;
use crate::pb::echo_server::Echo;
use crate::pb::v2::echo_server::Echo as EchoV2;
use prost::Message;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::{Code, Request, Response, Status, Streaming};

/// Number of messages produced by `ServerStreamingEcho`.
pub const SERVER_STREAM_LENGTH: usize = 10;

/// Type URL of a detail payload the test schema does not define.
pub const UNREGISTERED_DETAIL_TYPE: &str = "type.googleapis.com/grpcurl.test.Unregistered";

/// `google.rpc.Status`, the payload of the `grpc-status-details-bin` trailer.
#[derive(Clone, PartialEq, Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<prost_types::Any>,
}

pub struct EchoService;

pub struct EchoV2Service;

type EchoStream = ReceiverStream<Result<EchoMessage, Status>>;

#[tonic::async_trait]
impl Echo for EchoService {
    type ServerStreamingEchoStream = EchoStream;
    type BidiStreamingBulkEchoStream = EchoStream;

    async fn echo(&self, request: Request<EchoMessage>) -> Result<Response<EchoMessage>, Status> {
        echo(request)
    }

    async fn client_streaming_echo(
        &self,
        request: Request<Streaming<EchoMessage>>,
    ) -> Result<Response<EchoMessage>, Status> {
        let mut stream = request.into_inner();
        let mut last = EchoMessage::default();

        while let Some(message) = stream.next().await {
            last = message?;
        }

        Ok(Response::new(last))
    }

    async fn server_streaming_echo(
        &self,
        request: Request<EchoMessage>,
    ) -> Result<Response<Self::ServerStreamingEchoStream>, Status> {
        let message = request.into_inner();
        let (tx, rx) = mpsc::channel(SERVER_STREAM_LENGTH);

        tokio::spawn(async move {
            for _ in 0..SERVER_STREAM_LENGTH {
                if tx.send(Ok(message.clone())).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn bidi_streaming_bulk_echo(
        &self,
        request: Request<Streaming<EchoMessage>>,
    ) -> Result<Response<Self::BidiStreamingBulkEchoStream>, Status> {
        let mut stream = request.into_inner();
        let (tx, rx) = mpsc::channel(SERVER_STREAM_LENGTH);

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                if tx.send(message).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[tonic::async_trait]
impl EchoV2 for EchoV2Service {
    async fn echo(&self, request: Request<EchoMessage>) -> Result<Response<EchoMessage>, Status> {
        echo(request)
    }
}

/// Echoes the message and every `x-` prefixed request header.
fn echo(request: Request<EchoMessage>) -> Result<Response<EchoMessage>, Status> {
    let echoed_headers = echoed_headers(request.metadata());
    let message = request.into_inner();

    if message.error_code != 0 {
        return Err(error_status(&message));
    }

    let mut response = Response::new(message);
    *response.metadata_mut() = echoed_headers;

    Ok(response)
}

fn echoed_headers(metadata: &MetadataMap) -> MetadataMap {
    let mut echoed = MetadataMap::new();

    for entry in metadata.iter() {
        match entry {
            tonic::metadata::KeyAndValueRef::Ascii(key, value) if key.as_str().starts_with("x-") => {
                echoed.append(key.clone(), value.clone());
            }
            tonic::metadata::KeyAndValueRef::Binary(key, value)
                if key.as_str().starts_with("x-") =>
            {
                echoed.append_bin(key.clone(), value.clone());
            }
            _ => {}
        }
    }

    echoed
}

/// A status with the requested code whose details carry the request itself and a payload of an
/// unknown type.
fn error_status(message: &EchoMessage) -> Status {
    let text = format!("error msg: {}", message.value);

    let details = RpcStatus {
        code: message.error_code,
        message: text.clone(),
        details: vec![
            prost_types::Any {
                type_url: "type.googleapis.com/grpcurl.test.EchoMessage".to_string(),
                value: message.encode_to_vec(),
            },
            prost_types::Any {
                type_url: UNREGISTERED_DETAIL_TYPE.to_string(),
                value: vec![8, 1],
            },
        ],
    };

    Status::with_details(
        Code::from(message.error_code),
        text,
        bytes::Bytes::from(details.encode_to_vec()),
    )
}
