use crate::{
    config::ModelConfig,
    model_service::{ModelError, ModelService},
};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: Arc<str>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        let model_path = model_config.get_path();
        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path));
        }

        ort::init().with_name("covid_prediction").commit()?;

        let num_instances = model_config.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(&model_path)?;
                Ok(session)
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let output_name: Arc<str> = sessions[0]
            .outputs
            .first()
            .map(|output| output.name.as_str().into())
            .ok_or(ModelError::EmptyOutput)?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}, reading output `{}`",
            num_instances,
            model_path,
            output_name
        );

        Ok(Self {
            sessions: Arc::new(sessions.into_iter().map(Mutex::new).map(Arc::new).collect()),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<f32, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Poisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (_shape, data) = outputs[&*self.output_name].try_extract_tensor::<f32>()?;

        let score = data.first().copied().ok_or(ModelError::EmptyOutput)?;
        Ok(score)
    }
}

impl ModelService for OrtModelService {
    fn predict(&self, input: Array<f32, Ix4>) -> Result<f32, ModelError> {
        self.run_inference(&input)
    }
}
