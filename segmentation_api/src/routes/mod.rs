mod metrics;
mod predict;
mod root;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use tumor_segmentation::SegmentationModel;

pub use predict::{ErrorDetail, PredictError};
pub use root::ROOT_MESSAGE;

pub fn api_routes<M: SegmentationModel>() -> Router<SharedState<M>> {
    Router::new()
        .route("/", get(root::read_root))
        .route("/predict/", post(predict::predict::<M>))
        .route("/predict", post(predict::predict::<M>))
        .route("/metrics", get(metrics::metrics_handler::<M>))
}
