mod diagnosis;
mod model_service;
mod ort_service;
mod routes;
mod server;
mod transform;

pub mod config;

pub use diagnosis::Diagnosis;
pub use model_service::{ModelError, ModelService};
pub use server::{build_router, start_server};
pub use transform::transform_image;
