pub mod embeddings_service;
pub mod vector_store;
