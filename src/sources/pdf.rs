use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{InputError, ReelError, Result};
use crate::sources::{Document, DocumentSource};

const RASTER_PREFIX: &str = "raster";

/// Appraisal PDFs through poppler's `pdftoppm` and `pdftotext`
pub struct PdfDocumentSource {
    pdftoppm_bin: String,
    pdftotext_bin: String,
    dpi: u32,
}

impl PdfDocumentSource {
    pub fn new<S: Into<String>>(pdftoppm_bin: S, pdftotext_bin: S, dpi: u32) -> Self {
        Self {
            pdftoppm_bin: pdftoppm_bin.into(),
            pdftotext_bin: pdftotext_bin.into(),
            dpi,
        }
    }

    pub fn rasterize_args(&self, pdf: &Path, prefix: &Path) -> Vec<String> {
        vec![
            "-r".to_string(),
            self.dpi.to_string(),
            "-jpeg".to_string(),
            pdf.display().to_string(),
            prefix.display().to_string(),
        ]
    }

    pub fn text_args(&self, pdf: &Path, page: usize) -> Vec<String> {
        vec![
            "-f".to_string(),
            page.to_string(),
            "-l".to_string(),
            page.to_string(),
            "-layout".to_string(),
            pdf.display().to_string(),
            "-".to_string(),
        ]
    }

    async fn run(&self, program: &str, args: &[String], document: &Document) -> Result<Vec<u8>> {
        debug!("{} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| unreadable(document, format!("could not start {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(unreadable(
                document,
                format!("{} failed: {}", program, String::from_utf8_lossy(&output.stderr).trim()),
            ));
        }
        Ok(output.stdout)
    }
}

fn unreadable(document: &Document, reason: String) -> ReelError {
    InputError::DocumentUnreadable {
        path: document.reference.clone(),
        reason,
    }
    .into()
}

/// Page number from a `pdftoppm` output name like `raster-07.jpg`
fn raster_page(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(RASTER_PREFIX)?
        .trim_start_matches('-')
        .parse()
        .ok()
}

#[async_trait]
impl DocumentSource for PdfDocumentSource {
    fn name(&self) -> &str {
        "pdf"
    }

    async fn fetch(&self, reference: &str, dir: &Path) -> Result<Document> {
        let source = PathBuf::from(reference);
        if !source.is_file() {
            return Err(InputError::DocumentUnreadable {
                path: reference.to_string(),
                reason: "file not found".to_string(),
            }
            .into());
        }

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join("source.pdf");
        tokio::fs::copy(&source, &path).await?;

        Ok(Document {
            reference: reference.to_string(),
            path,
        })
    }

    async fn extract_pages(&self, document: &Document, dir: &Path) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(dir).await?;
        let args = self.rasterize_args(&document.path, &dir.join(RASTER_PREFIX));
        self.run(&self.pdftoppm_bin, &args, document).await?;

        // pdftoppm pads page numbers to the page count's width; normalize to page_NNN
        let mut rasters = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(page) = raster_page(&path) {
                rasters.push((page, path));
            }
        }
        rasters.sort_by_key(|(page, _)| *page);

        if rasters.is_empty() {
            return Err(unreadable(document, "no pages rendered".to_string()));
        }

        let mut pages = Vec::with_capacity(rasters.len());
        for (page, raster) in rasters {
            let target = dir.join(format!("page_{:03}.jpg", page));
            tokio::fs::rename(&raster, &target).await?;
            pages.push(target);
        }

        info!("Converted {} into {} page images", document.reference, pages.len());
        Ok(pages)
    }

    async fn extract_text(&self, document: &Document, page: usize) -> Result<String> {
        let stdout = self
            .run(&self.pdftotext_bin, &self.text_args(&document.path, page), document)
            .await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}
