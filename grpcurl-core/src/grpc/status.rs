//! # Remote Status
//!
//! A failed call is reported by the server as a `grpc-status` code, a message and optionally a
//! binary `google.rpc.Status` in `grpc-status-details-bin`. This module turns such a status into
//! a [`DynamicMessage`] of type `google.rpc.Status` so it can be printed like any response.
//!
//! The `google.rpc.Status` schema is not part of the reflected service schema, so it is built here
//! from hand-written descriptors.
use prost_reflect::{DescriptorError, DescriptorPool, DynamicMessage, MessageDescriptor, Value};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::error::Error as _;
use tonic::{Code, Status};

pub const STATUS_TYPE_NAME: &str = "google.rpc.Status";

#[derive(Debug, thiserror::Error)]
pub enum StatusSchemaError {
    #[error("Failed to build the google.rpc.Status schema: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("The google.rpc.Status schema is missing from its own descriptor pool")]
    Missing,
}

/// Builds the `google.rpc.Status` message descriptor.
pub fn status_descriptor() -> Result<MessageDescriptor, StatusSchemaError> {
    let mut pool = DescriptorPool::new();

    pool.add_file_descriptor_proto(any_file())?;
    pool.add_file_descriptor_proto(status_file())?;

    pool.get_message_by_name(STATUS_TYPE_NAME)
        .ok_or(StatusSchemaError::Missing)
}

/// Converts a status returned by the server into a `google.rpc.Status` message.
///
/// Code and message always come from the status itself. Details are taken from the binary
/// details payload when it can be decoded.
pub fn status_message(status: &Status) -> Result<DynamicMessage, StatusSchemaError> {
    let desc = status_descriptor()?;

    let mut message = if status.details().is_empty() {
        DynamicMessage::new(desc.clone())
    } else {
        DynamicMessage::decode(desc.clone(), status.details()).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring undecodable grpc-status-details-bin payload");
            DynamicMessage::new(desc.clone())
        })
    };

    message.set_field_by_name("code", Value::I32(status.code() as i32));
    message.set_field_by_name("message", Value::String(status.message().to_string()));

    Ok(message)
}

/// Tells apart a status produced by the server from one synthesized by the client because no
/// usable response arrived.
///
/// `responded` is whether response headers had been received when the status was produced.
/// Statuses carrying a source error always come from the client's transport stack. Before any
/// response, an `UNAVAILABLE`, `CANCELLED` or `DEADLINE_EXCEEDED` status without any metadata is
/// also the client's own: a server-sent status is at least accompanied by its content type.
pub fn is_transport_failure(status: &Status, responded: bool) -> bool {
    if status.source().is_some() {
        return true;
    }

    !responded
        && status.metadata().is_empty()
        && matches!(
            status.code(),
            Code::Unavailable | Code::Cancelled | Code::DeadlineExceeded
        )
}

fn any_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("google/protobuf/any.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Any".to_string()),
            field: vec![
                field("type_url", "typeUrl", 1, Type::String, Label::Optional, None),
                field("value", "value", 2, Type::Bytes, Label::Optional, None),
            ],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn status_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("google/rpc/status.proto".to_string()),
        package: Some("google.rpc".to_string()),
        dependency: vec!["google/protobuf/any.proto".to_string()],
        message_type: vec![DescriptorProto {
            name: Some("Status".to_string()),
            field: vec![
                field("code", "code", 1, Type::Int32, Label::Optional, None),
                field("message", "message", 2, Type::String, Label::Optional, None),
                field(
                    "details",
                    "details",
                    3,
                    Type::Message,
                    Label::Repeated,
                    Some(".google.protobuf.Any"),
                ),
            ],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn field(
    name: &str,
    json_name: &str,
    number: i32,
    r#type: Type,
    label: Label,
    type_name: Option<&str>,
) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        json_name: Some(json_name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(r#type as i32),
        type_name: type_name.map(str::to_string),
        ..Default::default()
    }
}
