use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{InputError, Result};
use crate::sources::mock::placeholder_specs;
use crate::sources::{record::safe_case_number, DataSource, PlaceholderRenderer, PropertyRecord};

/// Property JSON files written by operators
///
/// `<input_dir>/<case>.json` holds one record; images named in `image_urls`
/// are looked up under `<input_dir>/images`. Remote URLs are not fetched.
pub struct JsonFileSource {
    input_dir: PathBuf,
    renderer: PlaceholderRenderer,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(input_dir: P, renderer: PlaceholderRenderer) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            renderer,
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// File a case number resolves to; a `.json` path is taken as-is
    pub fn path_for(&self, case_number: &str) -> PathBuf {
        if case_number.ends_with(".json") {
            PathBuf::from(case_number)
        } else {
            self.input_dir.join(format!("{}.json", safe_case_number(case_number)))
        }
    }

    async fn load(path: &Path) -> Result<PropertyRecord> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| {
            InputError::InvalidRecord {
                details: format!("{}: {}", path.display(), e),
            }
            .into()
        })
    }
}

#[async_trait]
impl DataSource for JsonFileSource {
    fn name(&self) -> &str {
        "json"
    }

    async fn get_property(&self, case_number: &str) -> Result<PropertyRecord> {
        let path = self.path_for(case_number);
        if !path.is_file() {
            info!("No property file at {}; run `template` for an example", path.display());
            return Err(InputError::PropertyNotFound {
                case_number: case_number.to_string(),
            }
            .into());
        }
        Self::load(&path).await
    }

    async fn fetch_images(&self, record: &PropertyRecord, dir: &Path) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(dir).await?;
        let images_dir = self.input_dir.join("images");
        let case = record.safe_case_number();
        let mut images = Vec::new();

        for (i, url) in record.image_urls.iter().enumerate() {
            if url.starts_with("http://") || url.starts_with("https://") {
                warn!("Skipping remote image {}", url);
                continue;
            }

            let local = images_dir.join(url);
            if !local.is_file() {
                warn!("Image listed for {} not found: {}", record.case_number, local.display());
                continue;
            }

            let extension = local.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
            let dest = dir.join(format!("{}_image_{}.{}", case, i, extension));
            tokio::fs::copy(&local, &dest).await?;
            images.push(dest);
        }

        if images.is_empty() {
            debug!("No local images for {}, rendering placeholder", record.case_number);
            let mut specs = placeholder_specs(record, dir);
            // a single stand-in is enough when none of the listed images exist
            specs.truncate(1);
            if let Some(spec) = specs.first_mut() {
                spec.path = dir.join(format!("{}_placeholder.png", case));
                spec.label = record.asset_type_name.clone();
            }
            images = self.renderer.render_all(specs).await?;
        }

        Ok(images)
    }

    async fn search(&self, limit: usize) -> Result<Vec<PropertyRecord>> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.input_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        let mut records = Vec::new();
        for path in files {
            if records.len() >= limit {
                break;
            }
            match Self::load(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }
}
