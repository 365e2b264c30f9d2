pub mod answer;
pub mod chunking;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod gemini;
pub mod memory;
pub mod pacing;
pub mod rag;
pub mod similarity;
pub mod store;

pub use error::{RagError, Result};
