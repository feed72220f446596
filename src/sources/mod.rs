//! # Sources Module
//!
//! Where job inputs come from. Property facts and their images arrive through
//! a [`DataSource`]; appraisal documents and their pages through a
//! [`DocumentSource`]. Each trait has a mock variant for development and a
//! real one, picked from configuration.

pub mod json;
pub mod mock;
pub mod pdf;
pub mod placeholder;
pub mod record;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, DataSourceKind, DocumentSourceKind};
use crate::error::Result;

pub use json::JsonFileSource;
pub use mock::{MockDataSource, MockDocumentSource};
pub use pdf::PdfDocumentSource;
pub use placeholder::{PlaceholderRenderer, PlaceholderSpec};
pub use record::{AssetType, PropertyRecord, RightIssue, RiskLevel};

/// Property facts and images by case number
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    /// `InputError::PropertyNotFound` when the case is unknown
    async fn get_property(&self, case_number: &str) -> Result<PropertyRecord>;

    /// Materialize the record's images into `dir`; never returns an empty list
    async fn fetch_images(&self, record: &PropertyRecord, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Known properties, at most `limit`
    async fn search(&self, limit: usize) -> Result<Vec<PropertyRecord>>;
}

/// A source document copied into a job's working directory
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// What the caller asked for (path or identifier)
    pub reference: String,
    /// Local copy
    pub path: PathBuf,
}

/// Appraisal documents: page images plus per-page text
#[async_trait]
pub trait DocumentSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, reference: &str, dir: &Path) -> Result<Document>;

    /// One image per page, in page order
    async fn extract_pages(&self, document: &Document, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Text of a 1-based page
    async fn extract_text(&self, document: &Document, page: usize) -> Result<String>;
}

pub fn data_source_from_config(config: &Config) -> Arc<dyn DataSource> {
    let renderer = PlaceholderRenderer::new(config.video.width, config.video.height);
    match config.sources.data {
        DataSourceKind::Mock => Arc::new(MockDataSource::new(renderer)),
        DataSourceKind::Json => Arc::new(JsonFileSource::new(&config.paths.input_dir, renderer)),
    }
}

pub fn document_source_from_config(config: &Config) -> Arc<dyn DocumentSource> {
    let sources = &config.sources;
    match sources.document {
        DocumentSourceKind::Mock => Arc::new(MockDocumentSource::new(
            PlaceholderRenderer::new(config.video.width, config.video.height),
            sources.mock_pages,
        )),
        DocumentSourceKind::Pdf => Arc::new(PdfDocumentSource::new(
            sources.pdftoppm_bin.clone(),
            sources.pdftotext_bin.clone(),
            sources.pdf_dpi,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories_follow_config() {
        let mut config = Config::default();
        assert_eq!(data_source_from_config(&config).name(), "mock");
        assert_eq!(document_source_from_config(&config).name(), "mock");

        config.sources.data = DataSourceKind::Json;
        config.sources.document = DocumentSourceKind::Pdf;
        assert_eq!(data_source_from_config(&config).name(), "json");
        assert_eq!(document_source_from_config(&config).name(), "pdf");
    }
}
