#![deny(missing_docs)]

//! Core library for the docdigest upload and summarization service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Text extraction for PDF, DOCX and plain-text uploads.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload metrics helpers.
pub mod metrics;
/// Upload pipeline orchestration.
pub mod processing;
/// Document persistence over SQLite or MySQL.
pub mod repository;
/// Raw upload storage on disk.
pub mod storage;
/// Summarization client and model backends.
pub mod summarization;
