//! # grpcurl Core
//!
//! `grpcurl-core` is the engine behind the `grpcurl` CLI. It calls methods on any gRPC server
//! without compile-time knowledge of its Protobuf schema: the schema is discovered at runtime
//! through server reflection and messages are built generically from JSON.
//!
//! ## Key Components
//!
//! * **[`client::DynamicClient`]:** The main entry point. It resolves a method through reflection,
//!   decodes the JSON body, invokes the method and encodes the response back to JSON.
//! * **[`reflection::client::ReflectionClient`]:** A `grpc.reflection.v1` client (with a
//!   `v1alpha` fallback) that turns service and method names into descriptors.
//! * **[`codec::MessageCodec`]:** Schema-driven conversion between JSON and
//!   [`prost_reflect::DynamicMessage`], including the Protobuf well-known types.
//! * **[`grpc::client::GrpcClient`]:** Invokes a unary method given only its descriptor and turns
//!   remote failures into `google.rpc.Status` messages.
//! * **[`metadata::MetadataSet`]:** Request and response metadata in `key: value` form.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod codec;
pub mod connection;
pub mod grpc;
pub mod metadata;
pub mod reflection;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
