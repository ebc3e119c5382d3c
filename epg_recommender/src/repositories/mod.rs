pub mod in_memory_vector_store;
pub mod qdrant_vector_store;
