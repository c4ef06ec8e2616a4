mod centroid;
mod embedding;

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use switchboard_core::Classifier;
use tracing::warn;

pub use centroid::CentroidClassifier;
pub use embedding::HashEmbeddingModel;

pub const DEFAULT_DATASET_PATH: &str = "data/intents.jsonl";
const EMBEDDING_DIMS: usize = 192;

pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Statistical classifier wiring. The rule catalog in `switchboard-core`
/// stays authoritative; this only supplies the optional probabilistic stage.
#[derive(Clone)]
pub struct MlStack {
    pub embedder: Arc<dyn EmbeddingModel>,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub dataset_path: String,
}

impl MlStack {
    pub fn load_default() -> Self {
        let dataset_path = env::var("SWITCHBOARD_INTENT_DATASET")
            .unwrap_or_else(|_| DEFAULT_DATASET_PATH.to_string());
        Self::load_optional(dataset_path)
    }

    /// Like `load_from`, but a missing or unreadable dataset leaves the
    /// classifier unset instead of failing.
    pub fn load_optional(dataset_path: String) -> Self {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashEmbeddingModel::new(EMBEDDING_DIMS));

        let classifier = if Path::new(&dataset_path).exists() {
            match CentroidClassifier::from_jsonl(&dataset_path, embedder.clone(), "centroid-intent") {
                Ok(clf) => Some(Arc::new(clf) as Arc<dyn Classifier>),
                Err(err) => {
                    warn!(
                        path = %dataset_path,
                        error = %format!("{err:#}"),
                        "ignoring unreadable intent dataset, using rules only"
                    );
                    None
                }
            }
        } else {
            None
        };

        Self {
            embedder,
            classifier,
            dataset_path,
        }
    }

    pub fn load_from(dataset_path: impl AsRef<Path>) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashEmbeddingModel::new(EMBEDDING_DIMS));
        let classifier =
            CentroidClassifier::from_jsonl(dataset_path.as_ref(), embedder.clone(), "centroid-intent")?;

        Ok(Self {
            embedder,
            classifier: Some(Arc::new(classifier)),
            dataset_path: dataset_path.as_ref().display().to_string(),
        })
    }
}
