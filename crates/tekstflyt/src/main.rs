//! Tekstflyt command line
//!
//! Usage:
//!     tekstflyt render tilbud.json --out ./out --signed
//!     tekstflyt chunk brosjyre.pdf

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use tekstflyt::config::ServiceConfig;
use tekstflyt::convert::FormatConverter;
use tekstflyt::naming::file_stem;
use tekstflyt::processing::{AttachmentExtractor, TextChunker};
use tekstflyt::render::{TemplateLibrary, TemplateRenderer};
use tekstflyt::storage::InMemoryDocumentStore;
use tekstflyt::telemetry::init_tracing;
use tekstflyt::types::NewDocument;

#[derive(Parser, Debug)]
#[command(name = "tekstflyt", about = "Branded document generation", version)]
struct Args {
    /// JSON configuration file (defaults plus environment when absent)
    #[arg(long, env = "TEKSTFLYT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a document request into Word and PDF files
    Render {
        /// Document fields as JSON (type code, recipient, prices, text)
        document: PathBuf,

        /// Output directory
        #[arg(long, default_value = "output")]
        out: PathBuf,

        /// Also produce the signed variant
        #[arg(long)]
        signed: bool,
    },
    /// Show how a file would be split for the knowledge base
    Chunk {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServiceConfig::from_file(path).map_err(anyhow::Error::msg)?,
        None => {
            let config = ServiceConfig::default().apply_env();
            config.validate().map_err(anyhow::Error::msg)?;
            config
        }
    };

    match args.command {
        Command::Render {
            document,
            out,
            signed,
        } => render(&config, &document, &out, signed).await,
        Command::Chunk { file } => chunk(&config, &file).await,
    }
}

async fn render(config: &ServiceConfig, input: &Path, out: &Path, signed: bool) -> Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request: NewDocument = serde_json::from_str(&json)
        .with_context(|| format!("Invalid document request in {}", input.display()))?;
    let doc = InMemoryDocumentStore::new().insert(request);

    let renderer = TemplateRenderer::new(
        TemplateLibrary::load(&config.templates)?,
        config.signature.clone(),
    );
    let converter = FormatConverter::from_config(&config.conversion);
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let stem = file_stem(&doc.document_name, Local::now().naive_local());
    let mut variants = vec![(false, out.join(format!("{}.docx", stem)))];
    if signed {
        variants.push((true, out.join(format!("{}_signed.docx", stem))));
    }

    for (signed, word) in variants {
        renderer.render(&doc, signed)?.write_to(&word)?;
        println!("Word: {}", word.display());
        match converter.to_pdf(&word).await {
            Some(pdf) => println!("PDF:  {}", pdf.display()),
            None => println!("PDF:  (conversion unavailable)"),
        }
    }
    Ok(())
}

async fn chunk(config: &ServiceConfig, file: &Path) -> Result<()> {
    let extractor = AttachmentExtractor::from_config(&config.extraction);
    let text = extractor.extract(file).await?;
    let chunker = TextChunker::from_config(&config.chunking);
    let chunks = chunker.chunk(&text);

    println!(
        "{}: {} characters, {} chunks (window {}, stride {})",
        file.display(),
        text.chars().count(),
        chunks.len(),
        config.chunking.chunk_size,
        chunker.stride()
    );
    for chunk in &chunks {
        let preview: String = chunk.text.chars().take(60).collect();
        println!(
            "  #{:<3} {:>6}..{:<6} {}",
            chunk.index,
            chunk.start_offset,
            chunk.end_offset,
            preview.replace('\n', " ")
        );
    }
    Ok(())
}
