use crate::pb::everything_server::Everything;
use crate::pb::{
    EnumMessage, MapMessage, NumberMessage, OneofMessage, SimpleMessage, WellKnownMessage,
};
use tonic::{Request, Response, Status};

/// Returns every request unchanged.
pub struct EverythingService;

#[tonic::async_trait]
impl Everything for EverythingService {
    async fn simple(
        &self,
        request: Request<SimpleMessage>,
    ) -> Result<Response<SimpleMessage>, Status> {
        Ok(Response::new(request.into_inner()))
    }

    async fn number(
        &self,
        request: Request<NumberMessage>,
    ) -> Result<Response<NumberMessage>, Status> {
        Ok(Response::new(request.into_inner()))
    }

    async fn enums(&self, request: Request<EnumMessage>) -> Result<Response<EnumMessage>, Status> {
        Ok(Response::new(request.into_inner()))
    }

    async fn oneof(
        &self,
        request: Request<OneofMessage>,
    ) -> Result<Response<OneofMessage>, Status> {
        Ok(Response::new(request.into_inner()))
    }

    async fn map(&self, request: Request<MapMessage>) -> Result<Response<MapMessage>, Status> {
        Ok(Response::new(request.into_inner()))
    }

    async fn well_known(
        &self,
        request: Request<WellKnownMessage>,
    ) -> Result<Response<WellKnownMessage>, Status> {
        Ok(Response::new(request.into_inner()))
    }
}
