//! Cohort Vector crate - text embeddings, theme vectors, and similarity matrices.
//!
//! Provides an embedding service trait with an ONNX sentence-transformer
//! backend and a deterministic mock, the theme vocabulary that maps
//! categorical theme scores onto fixed vector positions, and the similarity
//! engine that merges both signals into one distance matrix.

pub mod embedding;
pub mod similarity;
pub mod theme;

pub use embedding::{EmbeddingService, MockEmbedding, OnnxEmbeddingService};
pub use similarity::{
    cosine_similarity, text_similarity_matrix, theme_similarity_matrix, weighted_jaccard,
    CombinedMetric, SquareMatrix,
};
pub use theme::ThemeVocabulary;
