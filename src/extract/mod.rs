// Document extraction module
// Turns files on disk into extractable text units, one per embedding source


use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use calamine::{Data, Reader, open_workbook_auto};
use docx_rs::{
    Docx, DocumentChild, ParagraphChild, RunChild, TableCellContent, TableChild, TableRowChild,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::{Result, SemdexError};

/// Supported source document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Excel,
    Text,
}

impl DocumentKind {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Excel => "excel",
            Self::Text => "text",
        }
    }

    /// Kind for a file extension, if the extension is supported.
    #[inline]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" | "xls" => Some(Self::Excel),
            "txt" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = SemdexError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "excel" | "xlsx" | "xls" => Ok(Self::Excel),
            "text" | "txt" | "md" => Ok(Self::Text),
            other => Err(SemdexError::Config(format!(
                "Unknown document type: {} (expected pdf, docx, excel, or text)",
                other
            ))),
        }
    }
}

/// Where a unit of text came from within its source file.
///
/// The variant decides the shape of the chunk identifiers derived from it,
/// so sheet and row survive a round trip through the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkSource {
    TextFile {
        file_name: String,
    },
    ExcelRow {
        file_name: String,
        sheet: String,
        /// 1-based row number as a spreadsheet user would read it
        row: u32,
    },
}

impl ChunkSource {
    #[inline]
    pub fn file_name(&self) -> &str {
        match self {
            Self::TextFile { file_name } | Self::ExcelRow { file_name, .. } => file_name,
        }
    }

    #[inline]
    pub fn sheet(&self) -> Option<&str> {
        match self {
            Self::ExcelRow { sheet, .. } => Some(sheet),
            Self::TextFile { .. } => None,
        }
    }

    #[inline]
    pub fn row(&self) -> Option<u32> {
        match self {
            Self::ExcelRow { row, .. } => Some(*row),
            Self::TextFile { .. } => None,
        }
    }

    /// Identifier for the chunk at `index` within this source.
    ///
    /// Stable across runs for the same file, sheet, row, and index; a
    /// human reading one can locate the original text without the store.
    #[inline]
    pub fn chunk_id(&self, index: usize) -> String {
        match self {
            Self::ExcelRow {
                file_name,
                sheet,
                row,
            } => format!("{}_{}_row{}_chunk{}", file_name, sheet, row, index),
            Self::TextFile { file_name } => format!("{}_chunk_{}", file_name, index),
        }
    }
}

/// One unit of raw text extracted from a document.
///
/// Text-like formats produce a single unit per file; spreadsheets produce
/// one unit per non-empty row so each row chunks and embeds independently.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedUnit {
    pub text: String,
    pub kind: DocumentKind,
    pub file_path: String,
    pub source: ChunkSource,
}

/// Kind of a file judged by its extension, if supported.
#[inline]
pub fn supported_kind(path: &Path) -> Option<DocumentKind> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(DocumentKind::from_extension)
}

/// Extract all text units from a single file, dispatching on extension.
#[inline]
pub async fn extract_file(path: &Path) -> Result<Vec<ExtractedUnit>> {
    let kind = supported_kind(path)
        .ok_or_else(|| SemdexError::UnsupportedFormat(path.display().to_string()))?;

    debug!("Extracting {} as {}", path.display(), kind);

    match kind {
        DocumentKind::Text => extract_text(path).await,
        DocumentKind::Pdf => extract_pdf(path).await,
        DocumentKind::Docx => extract_docx(path).await,
        DocumentKind::Excel => extract_excel(path).await,
    }
}

/// Recursively (or not) collect supported files under `dir`, sorted by path.
#[inline]
pub fn discover_files(
    dir: &Path,
    recursive: bool,
    kinds: Option<&[DocumentKind]>,
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SemdexError::Extraction(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            SemdexError::Extraction(format!("Failed to walk {}: {}", dir.display(), e))
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Some(kind) = supported_kind(entry.path()) else {
            continue;
        };
        if kinds.is_some_and(|wanted| !wanted.contains(&kind)) {
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    debug!("Discovered {} supported files under {}", files.len(), dir.display());
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

async fn extract_text(path: &Path) -> Result<Vec<ExtractedUnit>> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        SemdexError::Extraction(format!("Failed to read {}: {}", path.display(), e))
    })?;

    Ok(vec![ExtractedUnit {
        text,
        kind: DocumentKind::Text,
        file_path: path.display().to_string(),
        source: ChunkSource::TextFile {
            file_name: file_name_of(path),
        },
    }])
}

async fn extract_pdf(path: &Path) -> Result<Vec<ExtractedUnit>> {
    let owned = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|e| SemdexError::Extraction(format!("PDF extraction task failed: {}", e)))?
        .map_err(|e| {
            SemdexError::Extraction(format!("Failed to parse PDF {}: {}", path.display(), e))
        })?;

    Ok(vec![ExtractedUnit {
        text,
        kind: DocumentKind::Pdf,
        file_path: path.display().to_string(),
        source: ChunkSource::TextFile {
            file_name: file_name_of(path),
        },
    }])
}

async fn extract_docx(path: &Path) -> Result<Vec<ExtractedUnit>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        SemdexError::Extraction(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let docx = tokio::task::spawn_blocking(move || docx_rs::read_docx(&bytes))
        .await
        .map_err(|e| SemdexError::Extraction(format!("DOCX extraction task failed: {}", e)))?
        .map_err(|e| {
            SemdexError::Extraction(format!("Failed to parse DOCX {}: {}", path.display(), e))
        })?;

    Ok(vec![ExtractedUnit {
        text: docx_text(&docx),
        kind: DocumentKind::Docx,
        file_path: path.display().to_string(),
        source: ChunkSource::TextFile {
            file_name: file_name_of(path),
        },
    }])
}

/// Visible text of a parsed DOCX document: body paragraphs plus table cells,
/// one line per paragraph.
fn docx_text(docx: &Docx) -> String {
    let mut lines = Vec::new();

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => push_paragraph(&mut lines, paragraph),
            DocumentChild::Table(table) => {
                for row in &table.rows {
                    let TableChild::TableRow(row) = row;
                    for cell in &row.cells {
                        let TableRowChild::TableCell(cell) = cell;
                        for content in &cell.children {
                            if let TableCellContent::Paragraph(paragraph) = content {
                                push_paragraph(&mut lines, paragraph);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    lines.join("\n")
}

fn push_paragraph(lines: &mut Vec<String>, paragraph: &docx_rs::Paragraph) {
    let text = paragraph_text(paragraph);
    if !text.is_empty() {
        lines.push(text);
    }
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();

    for child in &paragraph.children {
        match child {
            ParagraphChild::Run(run) => push_run(&mut text, run),
            ParagraphChild::Hyperlink(link) => {
                for nested in &link.children {
                    if let ParagraphChild::Run(run) = nested {
                        push_run(&mut text, run);
                    }
                }
            }
            _ => {}
        }
    }

    text.trim().to_string()
}

fn push_run(text: &mut String, run: &docx_rs::Run) {
    for child in &run.children {
        if let RunChild::Text(t) = child {
            text.push_str(&t.text);
        }
    }
}

async fn extract_excel(path: &Path) -> Result<Vec<ExtractedUnit>> {
    let owned = path.to_path_buf();
    let rows = tokio::task::spawn_blocking(move || read_workbook_rows(&owned))
        .await
        .map_err(|e| SemdexError::Extraction(format!("Excel extraction task failed: {}", e)))??;

    debug!("Extracted {} non-empty rows from {}", rows.len(), path.display());

    let file_name = file_name_of(path);
    let file_path = path.display().to_string();

    Ok(rows
        .into_iter()
        .map(|(sheet, row, text)| ExtractedUnit {
            text,
            kind: DocumentKind::Excel,
            file_path: file_path.clone(),
            source: ChunkSource::ExcelRow {
                file_name: file_name.clone(),
                sheet,
                row,
            },
        })
        .collect())
}

/// All non-empty rows of every sheet as `(sheet, 1-based row, joined text)`.
fn read_workbook_rows(path: &Path) -> Result<Vec<(String, u32, String)>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        SemdexError::Extraction(format!("Failed to open workbook {}: {}", path.display(), e))
    })?;

    let mut rows = Vec::new();
    for sheet in workbook.sheet_names() {
        let range = workbook.worksheet_range(&sheet).map_err(|e| {
            SemdexError::Extraction(format!("Failed to read sheet {}: {}", sheet, e))
        })?;

        let first_row = range.start().map_or(0, |(row, _)| row);
        for (offset, cells) in range.rows().enumerate() {
            if let Some(text) = row_text(cells) {
                rows.push((sheet.clone(), first_row + offset as u32 + 1, text));
            }
        }
    }

    Ok(rows)
}

/// Join a row's non-empty cells with single spaces; `None` for blank rows.
fn row_text(cells: &[Data]) -> Option<String> {
    let parts: Vec<String> = cells
        .iter()
        .filter(|cell| !matches!(cell, Data::Empty))
        .map(ToString::to_string)
        .filter(|text| !text.trim().is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
