//! # Test Service
//!
//! **INTERNAL USE ONLY**: gRPC services and descriptor sets used by the `grpcurl` integration
//! tests. The services implement the `grpcurl.test` protobuf package and are served together
//! with a reflection service so clients can discover them at runtime.

pub mod echo;
pub mod everything;

pub mod pb {
    pub mod v2 {
        include!(concat!(env!("OUT_DIR"), "/grpcurl.test.v2.rs"));
    }

    include!(concat!(env!("OUT_DIR"), "/grpcurl.test.rs"));
}

use tonic::service::Routes;
use tonic_reflection::server::Error as ReflectionBuildError;

pub use echo::{EchoService, EchoV2Service};
pub use everything::EverythingService;
pub use pb::echo_server::EchoServer;
pub use pb::everything_server::EverythingServer;
pub use pb::v2::echo_server::EchoServer as EchoV2Server;

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");

/// Every test service without any reflection service in front of it.
pub fn services() -> Routes {
    Routes::new(EchoServer::new(EchoService))
        .add_service(EverythingServer::new(EverythingService))
        .add_service(EchoV2Server::new(EchoV2Service))
}

/// Every test service plus a `grpc.reflection.v1` reflection service.
pub fn routes() -> Result<Routes, ReflectionBuildError> {
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Ok(services().add_service(reflection))
}

/// Every test service plus only the legacy `grpc.reflection.v1alpha` reflection service.
pub fn routes_v1alpha() -> Result<Routes, ReflectionBuildError> {
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1alpha()?;

    Ok(services().add_service(reflection))
}
