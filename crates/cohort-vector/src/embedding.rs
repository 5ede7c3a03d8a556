//! Text embedders for corporation descriptions.
//!
//! `OnnxEmbeddingService` runs a sentence-transformer export (the pipeline
//! defaults to paraphrase-MiniLM-L6-v2) locally through `ort`, tokenizing
//! with HuggingFace `tokenizers`. `MockEmbedding` hashes text into unit
//! vectors for tests and offline runs.
//!
//! Blank text embeds to the zero vector under both backends, so it has zero
//! cosine similarity to everything.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

use cohort_core::error::CohortError;
use ndarray::Array2;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Service for generating text embeddings.
///
/// Implementations map a batch of texts to one fixed-dimension vector per
/// text, preserving input order.
pub trait EmbeddingService: Send + Sync {
    /// Embed every text in `texts`; output position `i` belongs to input `i`.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, CohortError>> + Send;

    /// Width of every vector this service returns.
    fn dimensions(&self) -> usize;
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - sentence-transformer inference via ONNX Runtime
// ---------------------------------------------------------------------------

/// Texts per inference call.
const INFERENCE_BATCH: usize = 32;

/// Fallback width when the model does not declare its hidden size.
const DEFAULT_DIMENSIONS: usize = 384;

/// Sentence-transformer embeddings computed locally with ONNX Runtime.
///
/// The model directory holds `model.onnx` and `tokenizer.json`. The model
/// takes `input_ids`, `attention_mask` and `token_type_ids` (i64, padded to
/// the longest text of the batch) and returns token-level hidden states,
/// which are mean-pooled over the attention mask and L2-normalised.
#[derive(Clone)]
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

// Every use of the session goes through the mutex.
unsafe impl Send for OnnxEmbeddingService {}
unsafe impl Sync for OnnxEmbeddingService {}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingService {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn from_directory(model_dir: &Path) -> Result<Self, CohortError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
        )
    }

    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, CohortError> {
        for (what, path) in [("model", model_path), ("tokenizer", tokenizer_path)] {
            if !path.exists() {
                return Err(CohortError::EmbeddingUnavailable(format!(
                    "{what} not found at {}",
                    path.display()
                )));
            }
        }

        let session = Session::builder()
            .map_err(|e| unavailable("creating ONNX session", e))?
            .with_intra_threads(num_threads())
            .map_err(|e| unavailable("configuring ONNX threads", e))?
            .commit_from_file(model_path)
            .map_err(|e| unavailable("loading ONNX model", e))?;

        // Last axis of the [batch, tokens, hidden] output.
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .filter(|&d| d > 0)
            .map_or(DEFAULT_DIMENSIONS, |d| d as usize);

        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| unavailable("loading tokenizer", e))?;

        info!(model = %model_path.display(), dimensions, "Sentence embedding model ready");
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
        })
    }

    /// Embed `texts` in fixed-size batches. Blank texts are skipped and keep
    /// the zero vector.
    fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CohortError> {
        let mut vectors = vec![vec![0.0; self.dimensions]; texts.len()];
        let pending: Vec<usize> = (0..texts.len())
            .filter(|&i| !texts[i].trim().is_empty())
            .collect();

        let mut done = 0;
        for chunk in pending.chunks(INFERENCE_BATCH) {
            let inputs: Vec<&str> = chunk.iter().map(|&i| texts[i].as_str()).collect();
            for (&i, vector) in chunk.iter().zip(self.run_batch(&inputs)?) {
                vectors[i] = vector;
            }
            done += chunk.len();
            debug!(embedded = done, total = pending.len(), "Embedding progress");
        }
        Ok(vectors)
    }

    fn run_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, CohortError> {
        let encodings = self
            .tokenizer
            .encode_batch(inputs.to_vec(), true)
            .map_err(|e| unavailable("tokenization", e))?;

        let rows = encodings.len();
        let cols = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let mut ids = Array2::<i64>::zeros((rows, cols));
        let mut mask = Array2::<i64>::zeros((rows, cols));
        let mut types = Array2::<i64>::zeros((rows, cols));
        for (r, enc) in encodings.iter().enumerate() {
            let tokens = enc
                .get_ids()
                .iter()
                .zip(enc.get_attention_mask())
                .zip(enc.get_type_ids());
            for (c, ((&id, &m), &t)) in tokens.enumerate() {
                ids[[r, c]] = i64::from(id);
                mask[[r, c]] = i64::from(m);
                types[[r, c]] = i64::from(t);
            }
        }

        let ids_ref = TensorRef::from_array_view(&ids).map_err(|e| unavailable("input_ids", e))?;
        let mask_ref =
            TensorRef::from_array_view(&mask).map_err(|e| unavailable("attention_mask", e))?;
        let types_ref =
            TensorRef::from_array_view(&types).map_err(|e| unavailable("token_type_ids", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| unavailable("session lock", e))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, types_ref])
            .map_err(|e| unavailable("inference", e))?;
        let (shape, hidden) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| unavailable("reading hidden states", e))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        let width = match dims.as_slice() {
            [b, t, h] if *b as usize == rows && *t as usize == cols => *h as usize,
            other => {
                return Err(CohortError::EmbeddingUnavailable(format!(
                    "unexpected output shape {other:?} for a {rows}x{cols} batch"
                )))
            }
        };

        let stride = cols * width;
        Ok((0..rows)
            .map(|r| {
                let row_mask = mask.row(r).to_vec();
                mean_pool(&hidden[r * stride..(r + 1) * stride], &row_mask, width)
            })
            .collect())
    }
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CohortError> {
        let svc = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || svc.embed_blocking(&texts))
            .await
            .map_err(|e| unavailable("embedding task", e))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn num_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get().min(4))
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> CohortError {
    CohortError::EmbeddingUnavailable(format!("{context}: {err}"))
}

/// Average the hidden states of unmasked tokens, then L2-normalise.
fn mean_pool(hidden: &[f32], mask: &[i64], width: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; width];
    let mut tokens = 0usize;
    for (t, _) in mask.iter().enumerate().filter(|&(_, &m)| m > 0) {
        for (slot, v) in pooled.iter_mut().zip(&hidden[t * width..(t + 1) * width]) {
            *slot += v;
        }
        tokens += 1;
    }
    if tokens > 0 {
        pooled.iter_mut().for_each(|v| *v /= tokens as f32);
    }
    l2_normalize(&mut pooled);
    pooled
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding service that returns deterministic unit vectors.
///
/// The output is derived from a hash of the input text, so identical inputs
/// always produce identical outputs. Empty text yields the zero vector.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedding {
    /// 384 dimensions, matching MiniLM-class models.
    pub fn new() -> Self {
        Self::with_dimensions(384)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            return vec![0.0; self.dimensions];
        }

        let mut result = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        l2_normalize(&mut result);
        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CohortError> {
        Ok(texts.iter().map(|t| self.hash_to_vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
