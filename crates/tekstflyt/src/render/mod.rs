//! Branded Word rendering: template selection, placeholder substitution,
//! markup body and signature block.

pub mod markup;
pub mod placeholders;
pub mod template;

pub use markup::{Block, BlockKind, Span, SpanStyle};
pub use placeholders::{format_price, PlaceholderValues, BODY_TOKEN};
pub use template::{TemplateNode, TemplateTree};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use docx_rs::{read_docx, Docx, Paragraph, Pic, Run};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{SignatureConfig, TemplateConfig};
use crate::types::{Document, DocumentType};

/// Half-points.
const HEADING_SIZE: usize = 28;
const BULLET: &str = "• ";

/// Template bytes per document type, verified to exist and parse at load.
pub struct TemplateLibrary {
    templates: BTreeMap<DocumentType, (PathBuf, Arc<Vec<u8>>)>,
}

impl TemplateLibrary {
    pub fn load(config: &TemplateConfig) -> Result<Self> {
        let mut templates = BTreeMap::new();
        for document_type in DocumentType::ALL {
            let path = config.path_for(document_type);
            let bytes = std::fs::read(&path).with_context(|| {
                format!("Template for {} not found: {}", document_type, path.display())
            })?;
            read_docx(&bytes)
                .map_err(|e| anyhow!("Template {} is not a valid DOCX: {:?}", path.display(), e))?;
            templates.insert(document_type, (path, Arc::new(bytes)));
        }
        tracing::info!(dir = %config.dir.display(), "Loaded document templates");
        Ok(Self { templates })
    }

    pub fn path(&self, document_type: DocumentType) -> Option<&Path> {
        self.templates.get(&document_type).map(|(p, _)| p.as_path())
    }

    /// A fresh, independently owned copy of the template.
    fn open(&self, document_type: DocumentType) -> Result<Docx> {
        let (path, bytes) = self
            .templates
            .get(&document_type)
            .ok_or_else(|| anyhow!("No template configured for {}", document_type))?;
        read_docx(bytes)
            .map_err(|e| anyhow!("Failed to read template {}: {:?}", path.display(), e))
    }
}

pub struct RenderedDocument {
    docx: Docx,
    pub signed: bool,
}

impl RenderedDocument {
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut bytes);
        self.docx
            .build()
            .pack(&mut cursor)
            .map_err(|e| anyhow!("Failed to generate DOCX: {}", e))?;
        Ok(bytes)
    }

    pub fn write_to(self, path: &Path) -> Result<()> {
        let bytes = self.into_bytes()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

pub struct TemplateRenderer {
    templates: TemplateLibrary,
    signature: SignatureConfig,
}

impl TemplateRenderer {
    pub fn new(templates: TemplateLibrary, signature: SignatureConfig) -> Self {
        Self {
            templates,
            signature,
        }
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    pub fn render(&self, doc: &Document, signed: bool) -> Result<RenderedDocument> {
        self.render_on(doc, signed, Local::now().date_naive())
    }

    pub fn render_on(&self, doc: &Document, signed: bool, today: NaiveDate) -> Result<RenderedDocument> {
        let docx = self.templates.open(doc.document_type)?;
        let values = PlaceholderValues::for_document(doc, today);

        let body = markup::parse(doc.document_text.as_deref().unwrap_or_default());
        let tree = TemplateTree::from_children(&docx.document.children)
            .substitute(&values)
            .with_body(body.iter().map(block_paragraph).collect())
            .append(self.signature_block(signed));

        tracing::debug!(
            document_id = doc.id,
            signed,
            blocks = body.len(),
            nodes = tree.nodes.len(),
            "Rendered document"
        );

        Ok(RenderedDocument {
            docx: tree.into_docx(docx),
            signed,
        })
    }

    fn signature_block(&self, signed: bool) -> Vec<Paragraph> {
        let signature = &self.signature;
        let mut paragraphs = vec![
            Paragraph::new(),
            Paragraph::new().add_run(Run::new().add_text(&signature.valediction)),
        ];
        if !signed {
            return paragraphs;
        }

        if let Some(path) = &signature.image_path {
            match load_signature_image(path) {
                Ok(bytes) => paragraphs.push(Paragraph::new().add_run(Run::new().add_image(
                    Pic::new(&bytes).size(signature.image_width_emu, signature.image_height_emu),
                ))),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Signature image not added"),
            }
        }
        for line in [&signature.name, &signature.title, &signature.company] {
            paragraphs.push(Paragraph::new().add_run(Run::new().add_text(line)));
        }
        paragraphs
    }
}

fn load_signature_image(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_png = bytes.starts_with(&[0x89, b'P', b'N', b'G']);
    let is_jpeg = bytes.starts_with(&[0xFF, 0xD8, 0xFF]);
    if !is_png && !is_jpeg {
        return Err(anyhow!("not a PNG or JPEG image"));
    }
    Ok(bytes)
}

fn span_run(span: &Span) -> Run {
    let run = Run::new().add_text(&span.text);
    match span.style {
        SpanStyle::Plain => run,
        SpanStyle::Bold => run.bold(),
        SpanStyle::Italic => run.italic(),
    }
}

fn block_paragraph(block: &Block) -> Paragraph {
    match block.kind {
        BlockKind::Heading(_) => block.spans.iter().fold(Paragraph::new(), |p, span| {
            p.add_run(span_run(span).bold().size(HEADING_SIZE))
        }),
        BlockKind::Bullet => block
            .spans
            .iter()
            .fold(Paragraph::new().add_run(Run::new().add_text(BULLET)), |p, span| {
                p.add_run(span_run(span))
            }),
        BlockKind::Normal => block
            .spans
            .iter()
            .fold(Paragraph::new(), |p, span| p.add_run(span_run(span))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::storage::InMemoryDocumentStore;
    use crate::testing::template_config;
    use crate::types::NewDocument;
    use docx_rs::{Bold, DocumentChild, Italic, ParagraphChild, RunChild, Sz};
    use std::io::Read;

    /// 1x1 red pixel.
    const PIXEL_PNG: [u8; 70] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8,
        0xCF, 0xC0, 0xF0, 0x1F, 0x00, 0x05, 0x00, 0x01, 0xFF, 0x89, 0x99, 0x3D, 0x1D, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    fn renderer(dir: &Path) -> TemplateRenderer {
        let mut signature = ServiceConfig::default().signature;
        signature.image_path = Some(dir.join("missing.png"));
        TemplateRenderer::new(TemplateLibrary::load(&template_config(dir)).unwrap(), signature)
    }

    fn texts(rendered: RenderedDocument) -> Vec<String> {
        let bytes = rendered.into_bytes().unwrap();
        let docx = read_docx(&bytes).unwrap();
        TemplateTree::from_children(&docx.document.children).paragraph_texts()
    }

    /// Runs of every body paragraph as read back from the packed file.
    fn runs(bytes: &[u8]) -> Vec<Vec<Run>> {
        let docx = read_docx(bytes).unwrap();
        docx.document
            .children
            .into_iter()
            .filter_map(|child| match child {
                DocumentChild::Paragraph(p) => Some(
                    p.children
                        .into_iter()
                        .filter_map(|c| match c {
                            ParagraphChild::Run(run) => Some(*run),
                            _ => None,
                        })
                        .collect(),
                ),
                _ => None,
            })
            .collect()
    }

    fn run_text(run: &Run) -> String {
        run.children
            .iter()
            .filter_map(|c| match c {
                RunChild::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn note(text: &str) -> Document {
        let mut new = NewDocument::new(1, DocumentType::Note);
        new.document_text = Some(text.into());
        InMemoryDocumentStore::new().insert(new)
    }

    fn offer() -> Document {
        let mut new = NewDocument::new(1, DocumentType::Offer);
        new.document_name = Some("07.03.2025 - Tilbud på varmepumpe til Ola Nordmann".into());
        new.recipient_name = Some("Ola Nordmann".into());
        new.price_product = Some("1500.00".parse().unwrap());
        new.document_text = Some("# Title\n- point one\n---\n**bold** text".into());
        InMemoryDocumentStore::new().insert(new)
    }

    #[test]
    fn test_unsigned_offer_layout() {
        let dir = tempfile::tempdir().unwrap();
        let rendered = renderer(dir.path()).render(&offer(), false).unwrap();
        assert!(!rendered.signed);
        assert_eq!(
            texts(rendered),
            vec![
                "Tilbud til Ola Nordmann",
                "Pris: 1,500.00 kr",
                "Title",
                "• point one",
                "bold text",
                "Gjelder: varmepumpe",
                "",
                "Med vennlig hilsen",
            ]
        );
    }

    #[test]
    fn test_signed_variant_adds_signature_without_image() {
        let dir = tempfile::tempdir().unwrap();
        let rendered = renderer(dir.path()).render(&offer(), true).unwrap();
        let texts = texts(rendered);
        assert_eq!(
            &texts[texts.len() - 4..],
            &[
                "Med vennlig hilsen",
                "Trond Ilbråten",
                "Daglig leder",
                "Kulde- & Varmepumpeteknikk AS",
            ]
        );
    }

    #[test]
    fn test_body_is_appended_when_template_has_no_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut new = NewDocument::new(1, DocumentType::Note);
        new.document_text = Some("Befaring utført".into());
        let doc = InMemoryDocumentStore::new().insert(new);

        let rendered = renderer(dir.path())
            .render_on(&doc, false, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap())
            .unwrap();
        assert_eq!(
            texts(rendered),
            vec!["07.03.2025", "Befaring utført", "", "Med vennlig hilsen"]
        );
    }

    #[test]
    fn test_missing_template_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = template_config(dir.path());
        std::fs::remove_file(dir.path().join("note_template.docx")).unwrap();
        let err = TemplateLibrary::load(&config).err().unwrap();
        assert!(err.to_string().contains("Template for notat not found"));
    }

    #[test]
    fn test_markup_runs_carry_styling() {
        let dir = tempfile::tempdir().unwrap();
        let doc = note("# Title\n- point one\n**bold** text *soft*");
        let bytes = renderer(dir.path())
            .render_on(&doc, false, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap())
            .unwrap()
            .into_bytes()
            .unwrap();
        let paragraphs = runs(&bytes);

        let heading = &paragraphs[1];
        assert_eq!(heading.len(), 1);
        assert_eq!(run_text(&heading[0]), "Title");
        assert_eq!(heading[0].run_property.bold, Some(Bold::new()));
        assert_eq!(heading[0].run_property.sz, Some(Sz::new(HEADING_SIZE)));

        let bullet = &paragraphs[2];
        assert_eq!(bullet.iter().map(run_text).collect::<Vec<_>>(), vec!["• ", "point one"]);
        assert!(bullet.iter().all(|r| r.run_property.bold.is_none()));

        let normal = &paragraphs[3];
        assert_eq!(
            normal.iter().map(run_text).collect::<Vec<_>>(),
            vec!["bold", " text ", "soft"]
        );
        assert_eq!(normal[0].run_property.bold, Some(Bold::new()));
        assert!(normal[0].run_property.sz.is_none());
        assert!(normal[1].run_property.bold.is_none());
        assert!(normal[1].run_property.italic.is_none());
        assert_eq!(normal[2].run_property.italic, Some(Italic::new()));
        assert!(normal[2].run_property.bold.is_none());
    }

    #[test]
    fn test_signed_variant_embeds_signature_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("signatur.png");
        std::fs::write(&image, PIXEL_PNG).unwrap();
        let mut signature = ServiceConfig::default().signature;
        signature.image_path = Some(image);
        let renderer = TemplateRenderer::new(
            TemplateLibrary::load(&template_config(dir.path())).unwrap(),
            signature,
        );

        let bytes = renderer.render(&note("Befaring utført"), true).unwrap().into_bytes().unwrap();

        let paragraphs = runs(&bytes);
        let drawing_at = paragraphs
            .iter()
            .position(|p| {
                p.iter()
                    .any(|r| r.children.iter().any(|c| matches!(c, RunChild::Drawing(_))))
            })
            .expect("signature image paragraph");
        let after: Vec<String> = paragraphs[drawing_at + 1..]
            .iter()
            .map(|p| p.iter().map(run_text).collect())
            .collect();
        assert_eq!(
            after,
            vec!["Trond Ilbråten", "Daglig leder", "Kulde- & Varmepumpeteknikk AS"]
        );

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let media: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("word/media/") && n.ends_with(".png"))
            .map(String::from)
            .collect();
        assert_eq!(media.len(), 1);
        let mut png = Vec::new();
        archive.by_name(&media[0]).unwrap().read_to_end(&mut png).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_unsigned_variant_skips_signature_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("signatur.png");
        std::fs::write(&image, PIXEL_PNG).unwrap();
        let mut signature = ServiceConfig::default().signature;
        signature.image_path = Some(image);
        let renderer = TemplateRenderer::new(
            TemplateLibrary::load(&template_config(dir.path())).unwrap(),
            signature,
        );

        let bytes = renderer.render(&note("Befaring utført"), false).unwrap().into_bytes().unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert!(!archive.file_names().any(|n| n.ends_with(".png")));
    }
}
