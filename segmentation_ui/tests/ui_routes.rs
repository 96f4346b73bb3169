use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use segmentation_ui::{build_router, Branding};
use std::{io::Cursor, sync::Arc};
use tower::ServiceExt;
use tumor_segmentation::{
    mocks::{FailingSegmentationModel, MockSegmentationModel},
    ClassLabels, InferenceService, OverlayStyle, SegmentationModel,
};

const BOUNDARY: &str = "segmentation-ui-boundary";

fn allowed_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "png".to_string(), "jpeg".to_string()]
}

fn router<M: SegmentationModel>(model: M) -> Router {
    let inference_service =
        InferenceService::new(model, ClassLabels::default(), OverlayStyle::default());
    build_router(
        Ok(inference_service),
        Branding::default(),
        allowed_extensions(),
        50 * 1024 * 1024,
    )
}

fn uninitialized_router(message: &str) -> Router {
    build_router::<MockSegmentationModel>(
        Err(Arc::from(message)),
        Branding::default(),
        allowed_extensions(),
        50 * 1024 * 1024,
    )
}

fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 40]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

fn upload_request(file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn url_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}

fn predict_request(png_base64: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("image={}", url_encode(png_base64))))
        .unwrap()
}

async fn html(response: Response) -> String {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

/// Pulls the base64 payload of the `<figure>` with the given id.
fn figure_image(page: &str, id: &str) -> Vec<u8> {
    let marker = format!("<figure id=\"{}\"><img src=\"data:image/png;base64,", id);
    let start = page.find(&marker).unwrap() + marker.len();
    let end = start + page[start..].find('"').unwrap();
    STANDARD.decode(&page[start..end]).unwrap()
}

#[tokio::test]
async fn test_idle_page() {
    let response = router(MockSegmentationModel::new())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = html(response).await;
    assert!(page.contains("<h1>Brain Tumor Segmentation</h1>"));
    assert!(page.contains("Upload an MRI Image"));
    assert!(page.contains("accept=\".jpg,.png,.jpeg\""));
    assert!(!page.contains("predict-form"));
    assert!(!page.contains("init-error"));
}

#[tokio::test]
async fn test_upload_shows_image_and_predict_button() {
    let response = router(MockSegmentationModel::new())
        .oneshot(upload_request("Scan.JPG", &encoded_image(40, 30, ImageFormat::Jpeg)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = html(response).await;
    assert!(page.contains("Predict Tumor Segmentation"));
    assert!(page.contains("result-placeholder"));

    let uploaded = image::load_from_memory(&figure_image(&page, "uploaded")).unwrap();
    assert_eq!((uploaded.width(), uploaded.height()), (40, 30));
}

#[tokio::test]
async fn test_upload_rejects_extension() {
    let response = router(MockSegmentationModel::new())
        .oneshot(upload_request("scan.bmp", &encoded_image(8, 8, ImageFormat::Png)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = html(response).await;
    assert!(page.contains("upload-error"));
    assert!(page.contains("Unsupported file type `bmp`"));
    assert!(!page.contains("predict-form"));
}

#[tokio::test]
async fn test_upload_rejects_undecodable_file() {
    let response = router(MockSegmentationModel::new())
        .oneshot(upload_request("scan.png", b"definitely not a png"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = html(response).await;
    assert!(page.contains("Error decoding image"));
}

#[tokio::test]
async fn test_predict_shows_both_panes() {
    let original = STANDARD.encode(encoded_image(64, 48, ImageFormat::Png));

    let response = router(MockSegmentationModel::new())
        .oneshot(predict_request(&original))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = html(response).await;
    assert!(page.contains("Uploaded Image"));
    assert!(page.contains("Segmented Tumor"));
    assert!(!page.contains("result-placeholder"));

    let segmented = image::load_from_memory(&figure_image(&page, "segmented")).unwrap();
    assert_eq!((segmented.width(), segmented.height()), (64, 48));
}

#[tokio::test]
async fn test_predict_failure_keeps_result_empty() {
    let original = STANDARD.encode(encoded_image(16, 16, ImageFormat::Png));

    let response = router(FailingSegmentationModel)
        .oneshot(predict_request(&original))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = html(response).await;
    assert!(page.contains("Segmentation failed. Please try again."));
    assert!(page.contains("Prediction Error: mock model failure"));
    assert!(page.contains("result-placeholder"));
    assert!(!page.contains("id=\"segmented\""));
}

#[tokio::test]
async fn test_predict_rejects_bad_payload() {
    let response = router(MockSegmentationModel::new())
        .oneshot(predict_request("not*base64"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = html(response).await;
    assert!(page.contains("Invalid image payload"));
}

#[tokio::test]
async fn test_init_error_banner() {
    let app = uninitialized_router("Failed to load model ./model/best.onnx");

    let response = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = html(response).await;
    assert!(page.contains("init-error"));
    assert!(page.contains("Failed to load model ./model/best.onnx"));

    let original = STANDARD.encode(encoded_image(16, 16, ImageFormat::Png));
    let response = app.oneshot(predict_request(&original)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = html(response).await;
    assert!(page.contains("Model is not available"));
}

#[tokio::test]
async fn test_logo_route() {
    let response = router(MockSegmentationModel::new())
        .oneshot(Request::get("/logo.png").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let logo = encoded_image(4, 4, ImageFormat::Png);
    let app = build_router(
        Ok(InferenceService::new(
            MockSegmentationModel::new(),
            ClassLabels::default(),
            OverlayStyle::default(),
        )),
        Branding::from_bytes(logo.clone(), "image/png"),
        allowed_extensions(),
        1024 * 1024,
    );

    let response = app
        .clone()
        .oneshot(Request::get("/logo.png").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.to_vec(), logo);

    let page = html(
        app.oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert!(page.contains("rel=\"icon\""));
    assert!(page.contains("data:image/png;base64,"));
}
