mod bulk_ingest;
mod health_check;
mod helpers;
mod related;
mod upsert;
