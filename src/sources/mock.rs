use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{InputError, Result};
use crate::sources::{
    Document, DataSource, DocumentSource, PlaceholderRenderer, PlaceholderSpec, PropertyRecord,
};

const SAMPLE_PROPERTIES: &str = include_str!("../../data/sample_properties.json");

const MAP_COLOR: [u8; 3] = [200, 220, 200];

#[derive(Deserialize)]
struct SampleFile {
    properties: Vec<PropertyRecord>,
}

/// Bundled sample properties with rendered placeholder images
pub struct MockDataSource {
    properties: Vec<PropertyRecord>,
    renderer: PlaceholderRenderer,
}

impl MockDataSource {
    pub fn new(renderer: PlaceholderRenderer) -> Self {
        // bundled at compile time; a parse failure means an empty catalogue
        let properties = serde_json::from_str::<SampleFile>(SAMPLE_PROPERTIES)
            .map(|f| f.properties)
            .unwrap_or_default();
        Self::with_properties(properties, renderer)
    }

    pub fn with_properties(properties: Vec<PropertyRecord>, renderer: PlaceholderRenderer) -> Self {
        Self { properties, renderer }
    }
}

/// Placeholder per image URL, one for the map, and a default when there are none
pub(crate) fn placeholder_specs(record: &PropertyRecord, dir: &Path) -> Vec<PlaceholderSpec> {
    let case = record.safe_case_number();
    let mut specs: Vec<PlaceholderSpec> = (0..record.image_urls.len())
        .map(|i| {
            PlaceholderSpec::new(
                dir.join(format!("{}_image_{}.png", case, i)),
                format!("Property Image {}", i + 1),
            )
        })
        .collect();

    if record.map_image_url.is_some() {
        specs.push(
            PlaceholderSpec::new(dir.join(format!("{}_map.png", case)), "Location Map")
                .with_color(MAP_COLOR),
        );
    }

    if specs.is_empty() {
        specs.push(PlaceholderSpec::new(
            dir.join(format!("{}_default.png", case)),
            record.asset_type_name.clone(),
        ));
    }

    specs
}

#[async_trait]
impl DataSource for MockDataSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_property(&self, case_number: &str) -> Result<PropertyRecord> {
        self.properties
            .iter()
            .find(|p| p.case_number == case_number)
            .cloned()
            .ok_or_else(|| {
                InputError::PropertyNotFound {
                    case_number: case_number.to_string(),
                }
                .into()
            })
    }

    async fn fetch_images(&self, record: &PropertyRecord, dir: &Path) -> Result<Vec<PathBuf>> {
        let specs = placeholder_specs(record, dir);
        debug!("Rendering {} placeholder images for {}", specs.len(), record.case_number);
        self.renderer.render_all(specs).await
    }

    async fn search(&self, limit: usize) -> Result<Vec<PropertyRecord>> {
        Ok(self.properties.iter().take(limit).cloned().collect())
    }
}

/// Canned appraisal pages for development without PDFs
pub struct MockDocumentSource {
    renderer: PlaceholderRenderer,
    pages: usize,
}

impl MockDocumentSource {
    pub fn new(renderer: PlaceholderRenderer, pages: usize) -> Self {
        Self {
            renderer,
            pages: pages.max(1),
        }
    }

    fn page_text(page: usize) -> String {
        match page {
            1 => "This appraisal covers a detached house in Suwon with 85.5 pyeong of land \
                  and 132 pyeong of floor space."
                .to_string(),
            2 => "The appraised value is 850 million won. After two unsuccessful rounds the \
                  minimum bid stands at 544 million won, sixty four percent of the appraisal."
                .to_string(),
            n => format!(
                "Page {} notes a residential lease with a 200 million won deposit. \
                 Buyers should confirm occupancy on site before bidding.",
                n
            ),
        }
    }
}

#[async_trait]
impl DocumentSource for MockDocumentSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, reference: &str, dir: &Path) -> Result<Document> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join("source.txt");
        tokio::fs::write(&path, reference).await?;
        Ok(Document {
            reference: reference.to_string(),
            path,
        })
    }

    async fn extract_pages(&self, _document: &Document, dir: &Path) -> Result<Vec<PathBuf>> {
        let specs = (1..=self.pages)
            .map(|n| PlaceholderSpec::new(dir.join(format!("page_{:03}.png", n)), format!("Page {}", n)))
            .collect();
        self.renderer.render_all(specs).await
    }

    async fn extract_text(&self, _document: &Document, page: usize) -> Result<String> {
        Ok(Self::page_text(page))
    }
}
