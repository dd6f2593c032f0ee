//! Text embeddings for semantic matching.
//!
//! `OnnxEmbedder` (behind the `onnx` feature) runs a sentence-transformer
//! export such as all-MiniLM-L6-v2 and is the backend to use in production.
//! [`HashingEmbedder`] is the offline fallback: a deterministic bag of
//! hashed character trigrams and words that only catches typos and near
//! spellings, not paraphrases.

use std::path::PathBuf;

use thiserror::Error;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

pub const DEFAULT_DIMENSIONS: usize = 512;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyInput,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding backend failure: {0}")]
    Backend(String),
    #[error("embedding model file not found: `{}`", .0.display())]
    MissingModelFile(PathBuf),
}

/// Converts text into fixed-dimensional vectors.
///
/// Calls may be slow and CPU-bound; never invoke them while holding the
/// session store lock.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimensions(&self) -> usize;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Cosine similarity of two vectors. Zero vectors compare as 0.
pub fn cosine(left: &[f32], right: &[f32]) -> Result<f32, EmbeddingError> {
    if left.len() != right.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: left.len(),
            actual: right.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut left_norm = 0.0f32;
    let mut right_norm = 0.0f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (left_norm.sqrt() * right_norm.sqrt()))
}

/// Highest similarity between `query` and any of `candidates`, with its index.
pub fn best_similarity(
    query: &[f32],
    candidates: &[Vec<f32>],
) -> Result<Option<(usize, f32)>, EmbeddingError> {
    let mut best: Option<(usize, f32)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let similarity = cosine(query, candidate)?;
        if best.map_or(true, |(_, top)| similarity > top) {
            best = Some((index, similarity));
        }
    }
    Ok(best)
}

#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn bucket(&self, feature: &str) -> usize {
        (fnv1a(feature.as_bytes()) % self.dimensions as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let normalized = fold_text(text);
        let words = normalized.split_whitespace().collect::<Vec<_>>();
        if words.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for word in words {
            vector[self.bucket(&format!("w:{word}"))] += 1.0;

            let padded = format!("#{word}#").chars().collect::<Vec<_>>();
            for trigram in padded.windows(3) {
                let feature = trigram.iter().collect::<String>();
                vector[self.bucket(&feature)] += 1.0;
            }
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Lowercases, strips Spanish diacritics and replaces punctuation with spaces.
pub fn fold_text(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|character| match character {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            other if other.is_alphanumeric() || other.is_whitespace() => other,
            _ => ' ',
        })
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashMap;
    use std::sync::{Mutex, PoisonError};

    use super::{Embedder, EmbeddingError, DEFAULT_DIMENSIONS};

    /// Returns fixed vectors for known texts and a zero vector otherwise.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedEmbedder {
        dimensions: usize,
        vectors: HashMap<String, Vec<f32>>,
        calls: Mutex<usize>,
    }

    impl ScriptedEmbedder {
        pub(crate) fn new(dimensions: usize) -> Self {
            Self { dimensions, vectors: HashMap::new(), calls: Mutex::new(0) }
        }

        pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Embedder for ScriptedEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
            Ok(self.vectors.get(text).cloned().unwrap_or_else(|| vec![0.0; self.dimensions]))
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    /// Fails every call, for exercising absorbed-failure paths.
    #[derive(Debug, Default)]
    pub(crate) struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Backend("embedding backend offline".to_string()))
        }

        fn dimensions(&self) -> usize {
            DEFAULT_DIMENSIONS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{best_similarity, cosine, fold_text, Embedder, EmbeddingError, HashingEmbedder};

    #[test]
    fn identical_text_has_unit_similarity() {
        let embedder = HashingEmbedder::default();
        let left = embedder.embed("muéstramela ya").unwrap();
        let right = embedder.embed("Muéstramela, ya!").unwrap();

        assert!((cosine(&left, &right).unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn typos_stay_closer_than_unrelated_text() {
        let embedder = HashingEmbedder::default();
        let base = embedder.embed("millones").unwrap();
        let typo = embedder.embed("milones").unwrap();
        let unrelated = embedder.embed("habitaciones").unwrap();

        let typo_similarity = cosine(&base, &typo).unwrap();
        let unrelated_similarity = cosine(&base, &unrelated).unwrap();
        assert!(typo_similarity > 0.6, "typo similarity was {typo_similarity}");
        assert!(typo_similarity > unrelated_similarity);
    }

    #[test]
    fn output_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let first = embedder.embed("casa campestre").unwrap();
        let second = embedder.embed("casa campestre").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        let norm = first.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn blank_text_is_rejected() {
        let embedder = HashingEmbedder::default();
        assert_eq!(embedder.embed("  ¿?  "), Err(EmbeddingError::EmptyInput));
    }

    #[test]
    fn cosine_rejects_mismatched_dimensions() {
        assert!(matches!(
            cosine(&[1.0, 0.0], &[1.0]),
            Err(EmbeddingError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn best_similarity_prefers_first_of_equal_scores() {
        let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let (index, similarity) = best_similarity(&[1.0, 0.0], &candidates).unwrap().unwrap();
        assert_eq!(index, 0);
        assert!((similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn folding_removes_accents_and_punctuation() {
        assert_eq!(fold_text("¡Sí, Muéstrame!"), " si  muestrame ");
    }
}
