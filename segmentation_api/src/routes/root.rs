use axum::{response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

pub const ROOT_MESSAGE: &str = "Brain Tumor Segmentation API is running.";

#[derive(Serialize, Deserialize)]
pub struct Message {
    message: String,
}

pub async fn read_root() -> impl IntoResponse {
    Json(Message {
        message: ROOT_MESSAGE.into(),
    })
}
