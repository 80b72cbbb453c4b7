//! Per-format text extraction for ingested documents.
//!
//! Extraction is dispatched on file extension and runs CPU-bound work under
//! `spawn_blocking` so it never stalls the async executor. Failures identify
//! the file and cause; the ingestion driver catches them per file and keeps
//! going with the rest of the batch.

use anyhow::Result;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::ExtractError;

/// File extensions the ingestion driver accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// Extract the full text of a document, dispatching on its extension.
pub async fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => extract_pdf(path).await,
        "docx" => extract_docx(path).await,
        "txt" => extract_txt(path).await,
        _ => Err(ExtractError::UnsupportedFormat { extension }),
    }
}

pub async fn extract_txt(path: &Path) -> Result<String, ExtractError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Extract PDF text with a two-stage strategy: pure-Rust lopdf first, the
/// pdftotext binary as a fallback when lopdf cannot parse the file.
pub async fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let data = tokio::fs::read(path).await.map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let data_for_fallback = data.clone();
    let lopdf_result = tokio::task::spawn_blocking(move || lopdf_extract_sync(&data))
        .await
        .map_err(|e| pdf_error(path, format!("extraction task failed: {e}")))?;

    let lopdf_err = match lopdf_result {
        Ok(text) => {
            tracing::debug!(path = %path.display(), chars = text.chars().count(), "PDF extracted via lopdf");
            return Ok(text);
        }
        Err(e) => e,
    };

    tracing::warn!(
        path = %path.display(),
        error = %lopdf_err,
        "pure-Rust PDF extraction failed, falling back to pdftotext"
    );

    let pdftotext_result =
        tokio::task::spawn_blocking(move || pdftotext_extract_sync(&data_for_fallback))
            .await
            .map_err(|e| pdf_error(path, format!("extraction task failed: {e}")))?;

    match pdftotext_result {
        Ok(text) => {
            tracing::debug!(path = %path.display(), chars = text.chars().count(), "PDF extracted via pdftotext");
            Ok(text)
        }
        Err(pdftotext_err) => Err(pdf_error(
            path,
            format!("lopdf error: {lopdf_err}, pdftotext error: {pdftotext_err}"),
        )),
    }
}

/// DOCX is a zip container; the document body lives in word/document.xml as
/// paragraphs of `<w:t>` text runs.
pub async fn extract_docx(path: &Path) -> Result<String, ExtractError> {
    let data = tokio::fs::read(path).await.map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let path_buf = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || {
        docx_extract_sync(&data).map_err(|e| ExtractError::Docx {
            path: path_buf.clone(),
            reason: e.to_string(),
        })
    })
    .await
    .map_err(|e| ExtractError::Docx {
        path: path.to_path_buf(),
        reason: format!("extraction task failed: {e}"),
    })??;

    // A well-formed archive with no text runs yields nothing to index.
    if text.trim().is_empty() {
        return Err(ExtractError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(text)
}

fn pdf_error(path: &Path, reason: String) -> ExtractError {
    ExtractError::Pdf {
        path: path.to_path_buf(),
        reason,
    }
}

fn lopdf_extract_sync(data: &[u8]) -> Result<String> {
    use lopdf::Document;

    let doc = Document::load_mem(data)
        .map_err(|e| anyhow::anyhow!("lopdf failed to parse PDF: {e}"))?;

    let mut all_text = String::new();
    for (page_num, _page_id) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                if !all_text.is_empty() && !page_text.is_empty() {
                    all_text.push('\n');
                }
                all_text.push_str(&page_text);
            }
            Err(e) => {
                tracing::debug!("lopdf: failed to extract text from page {page_num}: {e}");
            }
        }
    }

    if all_text.trim().is_empty() {
        return Err(anyhow::anyhow!("lopdf extracted no text from PDF"));
    }

    Ok(all_text)
}

/// Shell out to the pdftotext binary. Temp file names carry a process-unique
/// counter so concurrent extractions do not collide.
fn pdftotext_extract_sync(data: &[u8]) -> Result<String> {
    use std::process::Command;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let serial = COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_file = std::env::temp_dir().join(format!(
        "policy_rag_{}_{serial}.pdf",
        std::process::id()
    ));

    std::fs::write(&temp_file, data)
        .map_err(|e| anyhow::anyhow!("failed to write temp PDF: {e}"))?;

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(&temp_file)
        .arg("-")
        .output();
    let _ = std::fs::remove_file(&temp_file);

    match output {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout).to_string();
            if text.trim().is_empty() {
                Err(anyhow::anyhow!("pdftotext produced no text output"))
            } else {
                Ok(text)
            }
        }
        Ok(output) => Err(anyhow::anyhow!(
            "pdftotext failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )),
        Err(e) => Err(anyhow::anyhow!(
            "pdftotext command failed: {e} (is poppler installed?)"
        )),
    }
}

fn docx_extract_sync(data: &[u8]) -> Result<String> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let cursor = std::io::Cursor::new(data);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| anyhow::anyhow!("not a valid DOCX archive: {e}"))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| anyhow::anyhow!("missing word/document.xml: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| anyhow::anyhow!("unreadable word/document.xml: {e}"))?;

    let mut reader = Reader::from_str(&xml);
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                // Paragraph boundaries become newlines, matching the
                // paragraph-per-line shape the chunker expects.
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                text.push_str(&t.unescape().map_err(|e| anyhow::anyhow!("bad XML text: {e}"))?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(anyhow::anyhow!("malformed document XML: {e}")),
        }
    }

    Ok(text)
}

/// Collect the supported document files directly under `dir` (recursively),
/// sorted for deterministic ingestion order.
pub fn collect_documents(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    paths
}
