//! Word to PDF conversion through an external office suite.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::ConversionConfig;

/// Runs `<converter> --headless --convert-to pdf --outdir <dir> <file>`.
/// Conversion is best effort: every failure is logged and reported as `None`.
pub struct FormatConverter {
    converter: PathBuf,
    timeout: Duration,
}

impl FormatConverter {
    pub fn new(converter: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            converter: converter.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(&config.converter, Duration::from_secs(config.timeout_secs))
    }

    /// The PDF lands next to the Word file with the same stem.
    pub async fn to_pdf(&self, word_path: &Path) -> Option<PathBuf> {
        let out_dir = match word_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let pdf_path = word_path.with_extension("pdf");

        let mut cmd = Command::new(&self.converter);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(&out_dir)
            .arg(word_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(
                    converter = %self.converter.display(),
                    error = %e,
                    "PDF converter unavailable"
                );
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    file = %word_path.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "PDF conversion timed out"
                );
                return None;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                file = %word_path.display(),
                exit_code = ?output.status.code(),
                stderr = %stderr.trim(),
                "PDF conversion failed"
            );
            return None;
        }
        if !pdf_path.exists() {
            tracing::warn!(expected = %pdf_path.display(), "Converter exited cleanly but produced no PDF");
            return None;
        }

        tracing::debug!(pdf = %pdf_path.display(), "Converted to PDF");
        Some(pdf_path)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-office");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh\n{}", body).unwrap();
            file.sync_all().unwrap();
        }
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn word_file(dir: &Path) -> PathBuf {
        let path = dir.join("tilbud_20250307_140509.docx");
        std::fs::write(&path, b"docx").unwrap();
        path
    }

    #[tokio::test]
    async fn test_successful_conversion_returns_sibling_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let converter = script(
            dir.path(),
            r#"name=$(basename "$6" .docx); echo pdf > "$5/$name.pdf""#,
        );
        let word = word_file(dir.path());

        let pdf = FormatConverter::new(converter, Duration::from_secs(10))
            .to_pdf(&word)
            .await;
        assert_eq!(pdf, Some(dir.path().join("tilbud_20250307_140509.pdf")));
    }

    #[tokio::test]
    async fn test_missing_binary_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let word = word_file(dir.path());
        let converter = FormatConverter::new(dir.path().join("no-such-office"), Duration::from_secs(5));
        assert_eq!(converter.to_pdf(&word).await, None);
    }

    #[tokio::test]
    async fn test_non_zero_exit_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let converter = script(dir.path(), "echo broken >&2; exit 3");
        let word = word_file(dir.path());
        let pdf = FormatConverter::new(converter, Duration::from_secs(10))
            .to_pdf(&word)
            .await;
        assert_eq!(pdf, None);
    }

    #[tokio::test]
    async fn test_clean_exit_without_output_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let converter = script(dir.path(), "exit 0");
        let word = word_file(dir.path());
        let pdf = FormatConverter::new(converter, Duration::from_secs(10))
            .to_pdf(&word)
            .await;
        assert_eq!(pdf, None);
    }

    #[tokio::test]
    async fn test_timeout_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let converter = script(dir.path(), "sleep 5");
        let word = word_file(dir.path());
        let pdf = FormatConverter::new(converter, Duration::from_millis(200))
            .to_pdf(&word)
            .await;
        assert_eq!(pdf, None);
    }
}
