pub mod find_related_contents;
pub mod ingest_contents;
pub mod precomputed_related;
