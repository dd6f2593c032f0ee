use std::fmt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::info;

use super::{Embedder, EmbeddingError};

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Hidden size of all-MiniLM-L6-v2, used when the model does not declare one.
const FALLBACK_DIMENSIONS: usize = 384;

/// Sentence-transformer embeddings through ONNX Runtime.
///
/// The model must take `input_ids`, `attention_mask` and `token_type_ids`
/// and return token embeddings; they are mean-pooled over the attention
/// mask and L2-normalized.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimensions: usize,
}

// The session is only used under its mutex.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxEmbedder").field("dimensions", &self.dimensions).finish()
    }
}

fn backend<E: fmt::Display>(context: &'static str) -> impl Fn(E) -> EmbeddingError {
    move |error| EmbeddingError::Backend(format!("{context}: {error}"))
}

impl OnnxEmbedder {
    /// Loads `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn from_directory(model_dir: &Path) -> Result<Self, EmbeddingError> {
        Self::from_files(&model_dir.join(MODEL_FILE), &model_dir.join(TOKENIZER_FILE))
    }

    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, EmbeddingError> {
        for path in [model_path, tokenizer_path] {
            if !path.exists() {
                return Err(EmbeddingError::MissingModelFile(path.to_path_buf()));
            }
        }

        let session = Session::builder()
            .map_err(backend("onnx session builder"))?
            .with_intra_threads(1)
            .map_err(backend("onnx thread setup"))?
            .commit_from_file(model_path)
            .map_err(backend("onnx model load"))?;

        let dimensions = session
            .outputs()
            .first()
            .and_then(|output| output.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|size| if size > 0 { size as usize } else { FALLBACK_DIMENSIONS })
            .unwrap_or(FALLBACK_DIMENSIONS);

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(backend("tokenizer load"))?;

        info!(model = %model_path.display(), dimensions, "onnx embedding model loaded");
        Ok(Self { session: Mutex::new(session), tokenizer, dimensions })
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let encoding = self.tokenizer.encode(text, true).map_err(backend("tokenization"))?;
        let input_ids = encoding.get_ids().iter().map(|&id| i64::from(id)).collect::<Vec<_>>();
        let attention_mask =
            encoding.get_attention_mask().iter().map(|&mask| i64::from(mask)).collect::<Vec<_>>();
        let token_type_ids =
            encoding.get_type_ids().iter().map(|&kind| i64::from(kind)).collect::<Vec<_>>();
        let tokens = input_ids.len();

        let ids = ndarray::Array2::from_shape_vec((1, tokens), input_ids)
            .map_err(backend("input_ids shape"))?;
        let mask = ndarray::Array2::from_shape_vec((1, tokens), attention_mask.clone())
            .map_err(backend("attention_mask shape"))?;
        let types = ndarray::Array2::from_shape_vec((1, tokens), token_type_ids)
            .map_err(backend("token_type_ids shape"))?;

        let ids = TensorRef::from_array_view(&ids).map_err(backend("input_ids tensor"))?;
        let mask = TensorRef::from_array_view(&mask).map_err(backend("attention_mask tensor"))?;
        let types = TensorRef::from_array_view(&types).map_err(backend("token_type_ids tensor"))?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs =
            session.run(ort::inputs![ids, mask, types]).map_err(backend("onnx inference"))?;
        let (shape, data) =
            outputs[0].try_extract_tensor::<f32>().map_err(backend("onnx output"))?;

        let dims = shape.iter().copied().collect::<Vec<i64>>();
        let hidden = match dims.as_slice() {
            [_, .., size] if *size > 0 => *size as usize,
            _ => {
                return Err(EmbeddingError::Backend(format!("unexpected onnx output shape {dims:?}")))
            }
        };
        Ok(mean_pool(data, &attention_mask, hidden))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Averages the token vectors the mask keeps, then L2-normalizes.
fn mean_pool(tokens: &[f32], attention_mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut kept = 0.0f32;

    for (index, _) in attention_mask.iter().enumerate().filter(|(_, mask)| **mask > 0) {
        let Some(token) = tokens.get(index * hidden..(index + 1) * hidden) else {
            break;
        };
        for (sum, value) in pooled.iter_mut().zip(token) {
            *sum += value;
        }
        kept += 1.0;
    }

    if kept > 0.0 {
        for value in &mut pooled {
            *value /= kept;
        }
    }
    let norm = pooled.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut pooled {
            *value /= norm;
        }
    }
    pooled
}
