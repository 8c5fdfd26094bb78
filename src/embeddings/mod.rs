// Embeddings module
// Provider client plus the text preparation that feeds it

pub mod openai;
pub mod text;

pub use openai::{EmbeddingError, KeyValidation, OpenAiClient};
pub use text::{content_fingerprint, document_text, prepare_text};
