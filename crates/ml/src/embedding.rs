use switchboard_core::tokenize;

use crate::EmbeddingModel;

/// Signed feature hashing over word tokens and character trigrams, so Arabic
/// words with attached prefixes still share most of their features.
#[derive(Debug, Clone)]
pub struct HashEmbeddingModel {
    dims: usize,
}

impl HashEmbeddingModel {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(32) }
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let index = (hash as usize) % self.dims;
        let sign = if (hash & 1) == 0 { 1.0 } else { -1.0 };
        vec[index] += sign * weight;
    }
}

impl EmbeddingModel for HashEmbeddingModel {
    fn model_name(&self) -> &'static str {
        "hash-embedding"
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0_f32; self.dims];

        for token in tokenize(text) {
            self.add_feature(&mut vec, &token, 1.0);

            let chars = token.chars().collect::<Vec<_>>();
            for window in chars.windows(3) {
                let trigram = window.iter().collect::<String>();
                self.add_feature(&mut vec, &trigram, 0.5);
            }
        }

        normalize(&mut vec);
        vec
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub(crate) fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_unit_length_and_stable() {
        let model = HashEmbeddingModel::new(64);
        let first = model.embed("Book a meeting tomorrow");
        let second = model.embed("book a MEETING tomorrow");
        assert_eq!(first, second);
        let norm = first.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let model = HashEmbeddingModel::new(8);
        let vec = model.embed("   ");
        assert_eq!(vec.len(), 32);
        assert!(vec.iter().all(|v| *v == 0.0));
    }
}
