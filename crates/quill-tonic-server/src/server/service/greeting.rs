use quill_tonic_core::{
    Error,
    proto::{GreetingRequest, GreetingResponse, greeting_service_server::GreetingService},
};
use tonic::{Request, Response, Status};

#[derive(Clone, Debug, Default)]
pub struct GreetingHandler;

#[tonic::async_trait]
impl GreetingService for GreetingHandler {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn greet(
        &self,
        req: Request<GreetingRequest>,
    ) -> Result<Response<GreetingResponse>, Status> {
        let first_name = req.into_inner().first_name;
        if first_name.trim().is_empty() {
            return Err(Error::invalid_argument("The first name must not be empty").into());
        }

        Ok(Response::new(GreetingResponse {
            result: format!("Hello {first_name}"),
        }))
    }
}
