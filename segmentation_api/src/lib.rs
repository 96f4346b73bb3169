mod routes;
mod server;
mod telemetry;

pub mod app;

pub use app::start_app;
pub use routes::{ErrorDetail, PredictError, ROOT_MESSAGE};
pub use server::{build_router, HttpServer, SharedState};
pub use telemetry::Metrics;
