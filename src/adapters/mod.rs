pub mod embedding;
pub mod hashing;
pub mod ollama;
pub mod openai;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;
