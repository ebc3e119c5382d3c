pub mod collection;
pub mod content_point;
pub mod content_record;
pub mod ingestion_summary;
pub mod point;
pub mod precomputed_related;
pub mod related_content;
