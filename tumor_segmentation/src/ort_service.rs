use crate::{
    config::{ModelConfig, Validatable},
    decoded_image::DecodedImage,
    errors::{Result, SegmentationError},
    model_service::SegmentationModel,
    postprocess::{decode_segmentation, PostprocessSettings},
    prediction::Prediction,
    preprocess::image_to_tensor,
};
use ndarray::{Array, ArrayD, Ix4};
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

/// YOLO-seg network served by a pool of ONNX Runtime sessions.
#[derive(Clone)]
pub struct OrtSegmentationModel {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    settings: PostprocessSettings,
    detections_output: String,
    prototypes_output: String,
}

impl OrtSegmentationModel {
    pub fn new(model_config: &ModelConfig) -> Result<Self> {
        let model_path = model_config.get_path();
        let load_error = |reason: String| SegmentationError::ModelLoad {
            path: model_path.clone(),
            reason,
        };

        model_config.validate().map_err(load_error)?;
        if model_config.input_size == 0 {
            return Err(SegmentationError::Configuration(
                "model input_size must be positive".to_string(),
            ));
        }

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = load_session(&model_path).map_err(load_error)?;
                let available: Vec<&str> = session
                    .outputs
                    .iter()
                    .map(|output| output.name.as_str())
                    .collect();
                check_outputs(
                    &available,
                    &[
                        model_config.detections_output.as_str(),
                        model_config.prototypes_output.as_str(),
                    ],
                )
                .map_err(load_error)?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_path
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            settings: PostprocessSettings::from(model_config),
            detections_output: model_config.detections_output.clone(),
            prototypes_output: model_config.prototypes_output.clone(),
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<(ArrayD<f32>, ArrayD<f32>)> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index].lock().map_err(|e| {
            SegmentationError::Inference(format!("session mutex poisoned: {}", e))
        })?;

        tracing::debug!("Handling request with session {}", index);
        let input_view = input.as_standard_layout();
        let tensor_ref = TensorRef::from_array_view(input_view.view()).map_err(|e| {
            SegmentationError::Inference(format!("failed to build tensor: {}", e))
        })?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| SegmentationError::Inference(format!("inference failed: {}", e)))?;

        // Output names were checked against the session when it was loaded.
        let extract = |name: &str| -> Result<ArrayD<f32>> {
            let array = outputs[name].try_extract_array::<f32>().map_err(|e| {
                SegmentationError::Inference(format!("failed to extract {}: {}", name, e))
            })?;
            Ok(array.into_owned())
        };

        let detections = extract(&self.detections_output)?;
        let prototypes = extract(&self.prototypes_output)?;
        Ok((detections, prototypes))
    }
}

fn check_outputs(available: &[&str], required: &[&str]) -> std::result::Result<(), String> {
    match required.iter().find(|name| !available.contains(*name)) {
        Some(name) => Err(format!(
            "model has no output named {}, found [{}]",
            name,
            available.join(", ")
        )),
        None => Ok(()),
    }
}

fn load_session(model_path: &Path) -> std::result::Result<Session, String> {
    let builder = Session::builder()
        .map_err(|e| format!("failed to create session builder: {}", e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| format!("failed to set optimization level: {}", e))?;

    #[cfg(feature = "tensorrt")]
    let builder = builder
        .with_execution_providers([TensorRTExecutionProvider::default()
            .with_engine_cache(true)
            .build()])
        .map_err(|e| format!("failed to register TensorRT: {}", e))?;

    #[cfg(feature = "cuda")]
    let builder = builder
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .map_err(|e| format!("failed to register CUDA: {}", e))?;

    builder
        .commit_from_file(model_path)
        .map_err(|e| format!("failed to load weights: {}", e))
}

impl SegmentationModel for OrtSegmentationModel {
    fn predict(&self, image: &DecodedImage) -> Result<Prediction> {
        let input = image_to_tensor(image, self.settings.input_size);
        let (detections, prototypes) = self.run_inference(&input)?;

        let prediction = decode_segmentation(
            detections.view(),
            prototypes.view(),
            image.width(),
            image.height(),
            &self.settings,
        )?;

        tracing::debug!("Returning {} detections", prediction.detections.len());
        Ok(prediction)
    }
}
