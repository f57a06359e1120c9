//! HTTP layer: backend seam, authenticated request pipeline and API service.

mod api;
mod backend;
mod pipeline;

pub use api::{ApiClient, LoginRequest, Profile, RegistrationRequest, StreamInfo};
#[cfg(test)]
pub use backend::MockHttpBackend;
pub use backend::{ApiRequest, ApiResponse, HttpBackend, ReqwestBackend};
pub use pipeline::{PublicRoutes, RequestPipeline};
