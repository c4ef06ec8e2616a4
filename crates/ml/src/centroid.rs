use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use switchboard_core::{Classifier, ClassifierVerdict, Intent};

use crate::embedding::normalize;
use crate::EmbeddingModel;

#[derive(Debug, Deserialize)]
struct LabeledExample {
    text: String,
    intent: String,
}

/// Nearest-centroid classifier over hashed embeddings.
#[derive(Clone)]
pub struct CentroidClassifier {
    model_name: &'static str,
    centroids: Vec<(Intent, Vec<f32>)>,
    embedder: Arc<dyn EmbeddingModel>,
}

impl CentroidClassifier {
    pub fn from_jsonl(
        path: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingModel>,
        model_name: &'static str,
    ) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "failed reading intent training dataset at {}",
                path.as_ref().display()
            )
        })?;

        Self::from_lines(&raw, embedder, model_name)
    }

    pub fn from_lines(
        raw: &str,
        embedder: Arc<dyn EmbeddingModel>,
        model_name: &'static str,
    ) -> Result<Self> {
        let mut by_intent: BTreeMap<Intent, Vec<Vec<f32>>> = BTreeMap::new();

        for (number, line) in raw
            .lines()
            .map(str::trim)
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
        {
            let example: LabeledExample = serde_json::from_str(line)
                .with_context(|| format!("invalid jsonl training line {}", number + 1))?;
            if let Some(intent) = Intent::from_label(&example.intent) {
                by_intent
                    .entry(intent)
                    .or_default()
                    .push(embedder.embed(&example.text));
            }
        }

        let centroids = by_intent
            .into_iter()
            .filter(|(_, vectors)| !vectors.is_empty())
            .map(|(intent, vectors)| (intent, centroid(&vectors)))
            .collect::<Vec<_>>();

        if centroids.is_empty() {
            anyhow::bail!("training dataset produced zero intent centroids");
        }

        Ok(Self {
            model_name,
            centroids,
            embedder,
        })
    }

    pub fn predict(&self, text: &str) -> (Intent, f32) {
        let query = self.embedder.embed(text);
        let mut best_intent = Intent::Unclear;
        let mut best_score = 0.0_f32;

        for (intent, center) in &self.centroids {
            let score = cosine_similarity(&query, center);
            if score > best_score {
                best_score = score;
                best_intent = *intent;
            }
        }

        (best_intent, best_score.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl Classifier for CentroidClassifier {
    fn name(&self) -> &str {
        self.model_name
    }

    async fn classify(&self, text: &str, categories: &[&'static str]) -> Result<ClassifierVerdict> {
        let (intent, confidence) = self.predict(text);
        let category = if categories.contains(&intent.as_label()) {
            intent.as_label()
        } else {
            Intent::Unclear.as_label()
        };

        Ok(ClassifierVerdict {
            category: category.to_string(),
            confidence,
        })
    }
}

fn centroid(vectors: &[Vec<f32>]) -> Vec<f32> {
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    let mut acc = vec![0.0_f32; dims];

    for vector in vectors {
        for (idx, value) in vector.iter().enumerate() {
            acc[idx] += value;
        }
    }

    for value in &mut acc {
        *value /= vectors.len() as f32;
    }
    normalize(&mut acc);
    acc
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        a_norm += lhs * lhs;
        b_norm += rhs * rhs;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        0.0
    } else {
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbeddingModel;

    const DATASET: &str = r#"
{"text": "I need a quote for a CRM", "intent": "sales_inquiry"}
{"text": "how much does the ERP package cost", "intent": "sales_inquiry"}
{"text": "book a meeting tomorrow", "intent": "appointment_scheduling"}
{"text": "schedule an appointment next week", "intent": "appointment_scheduling"}
{"text": "this label is ignored", "intent": "not_a_category"}
"#;

    fn classifier() -> CentroidClassifier {
        CentroidClassifier::from_lines(DATASET, Arc::new(HashEmbeddingModel::new(128)), "test")
            .unwrap()
    }

    #[tokio::test]
    async fn nearest_centroid_wins() {
        let verdict = classifier()
            .classify("can I book a meeting", &Intent::labels())
            .await
            .unwrap();
        assert_eq!(verdict.category, "appointment_scheduling");
        assert!(verdict.confidence > 0.0);
    }

    #[tokio::test]
    async fn unrelated_text_is_unclear() {
        let verdict = classifier().classify("", &Intent::labels()).await.unwrap();
        assert_eq!(verdict.category, "unclear");
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn rejects_empty_dataset_and_bad_lines() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashEmbeddingModel::new(64));
        assert!(CentroidClassifier::from_lines("", embedder.clone(), "t").is_err());
        assert!(CentroidClassifier::from_lines("{not json", embedder, "t").is_err());
    }
}
