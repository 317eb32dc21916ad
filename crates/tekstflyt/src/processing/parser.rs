//! Plain-text extraction from attachments and knowledge uploads.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::ExtractionConfig;

pub struct AttachmentExtractor {
    attachment_timeout: Duration,
    knowledge_timeout: Duration,
}

impl AttachmentExtractor {
    pub fn new(attachment_timeout: Duration, knowledge_timeout: Duration) -> Self {
        Self {
            attachment_timeout,
            knowledge_timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            Duration::from_secs(config.attachment_timeout_secs),
            Duration::from_secs(config.knowledge_timeout_secs),
        )
    }

    /// Extract the text of an attached file, dispatching on its extension.
    pub async fn extract(&self, path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let text = match extension.as_str() {
            "pdf" => {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read PDF: {}", path.display()))?;
                self.pdf_text(bytes, self.attachment_timeout).await?
            }
            "docx" | "doc" => {
                let owned = path.to_path_buf();
                run_blocking(self.attachment_timeout, move || parse_docx(&owned)).await?
            }
            "txt" | "csv" => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read text file: {}", path.display()))?,
            other => {
                return Err(anyhow!(
                    "Unsupported attachment type '{}': {}",
                    other,
                    path.display()
                ))
            }
        };

        tracing::debug!(path = %path.display(), chars = text.chars().count(), "Extracted attachment text");
        Ok(text)
    }

    /// Text of an uploaded knowledge PDF, under the longer ingestion timeout.
    pub async fn extract_knowledge_pdf(&self, bytes: Vec<u8>) -> Result<String> {
        self.pdf_text(bytes, self.knowledge_timeout).await
    }

    async fn pdf_text(&self, bytes: Vec<u8>, timeout: Duration) -> Result<String> {
        run_blocking(timeout, move || parse_pdf(&bytes)).await
    }
}

/// Run a CPU-bound parser off the async runtime with a deadline.
async fn run_blocking<F>(timeout: Duration, parse: F) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(parse)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(anyhow!("Text extraction task failed: {}", join_error)),
        Err(_) => Err(anyhow!(
            "Text extraction timed out after {}s",
            timeout.as_secs()
        )),
    }
}

fn parse_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| anyhow!("Failed to extract PDF text: {}", e))?;

    Ok(text
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn parse_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open DOCX: {}", path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read DOCX as ZIP: {}", path.display()))?;

    let mut xml_content = String::new();
    archive
        .by_name("word/document.xml")
        .with_context(|| format!("DOCX missing word/document.xml: {}", path.display()))?
        .read_to_string(&mut xml_content)
        .context("Failed to read document.xml from DOCX")?;

    Ok(extract_docx_text(&xml_content))
}

/// Paragraph-per-line text from `word/document.xml`.
fn extract_docx_text(xml: &str) -> String {
    static TEXT_RUN: OnceLock<Regex> = OnceLock::new();
    let text_run = TEXT_RUN.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("static regex")
    });

    xml.split("</w:p>")
        .map(|paragraph| {
            text_run
                .captures_iter(paragraph)
                .filter_map(|c| c.get(1))
                .map(|m| decode_entities(m.as_str()))
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_docx(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("brev.docx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body.as_bytes()).unwrap();
        zip.finish().unwrap();
        path
    }

    fn extractor() -> AttachmentExtractor {
        AttachmentExtractor::new(Duration::from_secs(30), Duration::from_secs(60))
    }

    #[test]
    fn test_docx_runs_are_joined_per_paragraph() {
        let xml = r#"<w:document><w:body>
            <w:p><w:pPr><w:tabs/></w:pPr><w:r><w:t>Kjære</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve"> kunde</w:t></w:r></w:p>
            <w:p><w:r><w:t>Kulde- &amp; Varmepumpeteknikk</w:t></w:r></w:p>
            <w:p></w:p>
        </w:body></w:document>"#;
        assert_eq!(
            extract_docx_text(xml),
            "Kjære kunde\nKulde- & Varmepumpeteknikk"
        );
    }

    #[tokio::test]
    async fn test_extracts_docx_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_docx(
            dir.path(),
            "<w:document><w:p><w:r><w:t>Vi viser til deres brev.</w:t></w:r></w:p></w:document>",
        );
        let text = extractor().extract(&path).await.unwrap();
        assert_eq!(text, "Vi viser til deres brev.");
    }

    #[tokio::test]
    async fn test_extracts_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notat.txt");
        std::fs::write(&path, "Service utført.").unwrap();
        assert_eq!(extractor().extract(&path).await.unwrap(), "Service utført.");
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bilde.png");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();
        let err = extractor().extract(&path).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported attachment type"));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_an_error() {
        let err = extractor()
            .extract_knowledge_pdf(b"not a pdf".to_vec())
            .await
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
