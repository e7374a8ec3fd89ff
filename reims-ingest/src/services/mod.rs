//! Ingestion pipeline components
//!
//! Filename analysis (`classifier`, `filename_parser`), object storage,
//! extraction, rent roll parsing and import, the processing worker, and the
//! read-side analytics and reconcile reports.

pub mod analytics;
pub mod classifier;
pub mod extractor;
pub mod filename_parser;
pub mod importer;
pub mod ingest;
pub mod reconciler;
pub mod rent_roll;
pub mod storage;
pub mod worker;

pub use classifier::classify_document;
pub use ingest::Ingestor;
pub use worker::{JobQueue, Processor};
