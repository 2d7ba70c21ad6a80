//! Folder of contract PDFs to one block of text.
//!
//! Every file whose extension is `pdf` (any case) is read, in file-name
//! order. Each document contributes a header line naming it followed by
//! its extracted text:
//!
//! ```text
//! ### DOCUMENTO: contrato.pdf
//! <text>
//! ```
//!
//! Non-PDF files and subdirectories are ignored. A folder without PDFs
//! fails with [`PipelineError::NoEligibleDocuments`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::PipelineError;

lazy_static! {
    static ref TRAILING_SPACE: Regex = Regex::new(r"[ \t]+\n").unwrap();
    static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Turns a folder into the text fed to the extraction prompt.
pub trait DocumentReader: Send + Sync {
    fn read_folder(&self, folder: &Path) -> Result<String, PipelineError>;
}

/// Text extraction for a single file.
pub type Extractor = fn(&Path) -> Result<String, String>;

/// Reads `*.pdf` files with `pdf-extract`.
#[derive(Debug, Clone)]
pub struct PdfFolderReader {
    extract: Extractor,
}

impl Default for PdfFolderReader {
    fn default() -> Self {
        Self {
            extract: extract_pdf_text,
        }
    }
}

impl PdfFolderReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different per-file extractor, e.g. an OCR backend.
    pub fn with_extractor(extract: Extractor) -> Self {
        Self { extract }
    }

    /// PDF files directly inside `folder`, sorted by file name.
    pub fn list_pdfs(folder: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        if !folder.is_dir() {
            return Err(PipelineError::FolderNotFound {
                path: folder.to_path_buf(),
            });
        }

        let entries = fs::read_dir(folder).map_err(|e| PipelineError::DocumentRead {
            path: folder.to_path_buf(),
            message: e.to_string(),
        })?;

        collect_pdfs(folder, entries.map(|entry| entry.map(|e| e.path())))
    }
}

/// Keep the PDF files among `entries`, sorted by file name.
///
/// An unreadable entry fails the listing: skipping it would silently
/// leave a document out of the analysis.
fn collect_pdfs(
    folder: &Path,
    entries: impl Iterator<Item = io::Result<PathBuf>>,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut pdfs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            tracing::warn!(folder = %folder.display(), error = %e, "Unreadable directory entry");
            PipelineError::DocumentRead {
                path: folder.to_path_buf(),
                message: e.to_string(),
            }
        })?;
        if path.is_file() && is_pdf(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}

impl DocumentReader for PdfFolderReader {
    fn read_folder(&self, folder: &Path) -> Result<String, PipelineError> {
        let pdfs = Self::list_pdfs(folder)?;
        let mut joined = String::new();

        for path in &pdfs {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::info!(document = %name, "Reading document");

            let text = (self.extract)(path).map_err(|message| PipelineError::DocumentRead {
                path: path.clone(),
                message,
            })?;
            let text = clean_text(&text);
            if text.is_empty() {
                tracing::warn!(document = %name, "Document has no extractable text");
            }

            joined.push_str(&document_section(&name, &text));
        }

        let joined = joined.trim();
        if joined.is_empty() {
            return Err(PipelineError::NoEligibleDocuments {
                path: folder.to_path_buf(),
            });
        }

        tracing::info!(documents = pdfs.len(), chars = joined.len(), "Documents read");
        Ok(joined.to_string())
    }
}

/// Header and body for one document.
pub fn document_section(name: &str, text: &str) -> String {
    format!("\n\n### DOCUMENTO: {}\n{}", name, text)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Strip trailing whitespace and collapse long runs of blank lines.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = TRAILING_SPACE.replace_all(&text, "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn extract_pdf_text(path: &Path) -> Result<String, String> {
    // pdf-extract can panic on malformed files
    let owned = path.to_path_buf();
    match std::panic::catch_unwind(move || pdf_extract::extract_text(&owned)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(format!("PDF extraction failed: {}", e)),
        Err(_) => Err("PDF extraction panicked (malformed PDF)".to_string()),
    }
}
