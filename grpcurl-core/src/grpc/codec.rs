//! # Dynamic Protobuf Codec
//!
//! This module implements `tonic::codec::Codec` so `tonic` can transport
//! [`DynamicMessage`] values directly, without generated Rust structs.
//!
//! * **Encoder**: writes the already-built request message in Protobuf binary format.
//! * **Decoder**: reads raw bytes from the wire into a `DynamicMessage` of the output schema.
//!
//! Failures are reported as statuses carrying the underlying error as their source, which marks
//! them as produced on the client side rather than sent by the server.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use std::sync::Arc;
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A Codec that sends and receives [`DynamicMessage`] values.
///
/// Only the response schema is needed: requests carry their own descriptor.
pub struct DynamicCodec {
    res_desc: MessageDescriptor,
}

impl DynamicCodec {
    pub fn new(res_desc: MessageDescriptor) -> Self {
        Self { res_desc }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;

    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.res_desc.clone())
    }
}

pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| client_status(format!("Failed to encode request message: {e}"), e))
    }
}

pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src)
            .map_err(|e| client_status(format!("Failed to decode Protobuf bytes: {e}"), e))?;

        Ok(Some(msg))
    }
}

fn client_status<E>(message: String, source: E) -> Status
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut status = Status::internal(message);
    status.set_source(Arc::new(source));
    status
}
