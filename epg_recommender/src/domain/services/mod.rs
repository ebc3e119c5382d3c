pub mod hashing_embedding;
pub mod helpers;
pub mod huggingface_embedding;
