use crate::error::ExtractError;
use lopdf::Document;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// Raw block extraction, dispatched on the file extension. One block per PDF
/// page, per DOCX paragraph, or per whole TXT file.
pub fn extract_raw(path: &Path) -> Result<Vec<String>, ExtractError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => extract_pdf_blocks(path),
        "docx" => extract_docx_blocks(path),
        "txt" => extract_txt_block(path),
        other => Err(ExtractError::UnsupportedFormat(other.to_string())),
    }
}

/// Primary path iterates pages with lopdf; pages with no text (scanned or
/// image-only) are skipped, not errors. A whole-document pass with
/// pdf-extract is the secondary method. When both methods fail the result is
/// a single sentinel block describing the failure, so batch extraction keeps
/// going for the remaining files.
fn extract_pdf_blocks(path: &Path) -> Result<Vec<String>, ExtractError> {
    match extract_pdf_pages(path) {
        Ok(pages) if !pages.is_empty() => Ok(pages),
        Ok(_) => {
            // Parsed cleanly but textless; the secondary extractor handles
            // encodings lopdf cannot.
            match pdf_extract::extract_text(path) {
                Ok(text) if !text.trim().is_empty() => Ok(vec![text]),
                _ => Ok(Vec::new()),
            }
        }
        Err(primary) => match pdf_extract::extract_text(path) {
            Ok(text) if !text.trim().is_empty() => Ok(vec![text]),
            Ok(_) => Ok(vec![failure_block(path, &primary.to_string())]),
            Err(secondary) => Ok(vec![failure_block(
                path,
                &format!("{primary}; fallback extraction failed: {secondary}"),
            )]),
        },
    }
}

fn extract_pdf_pages(path: &Path) -> Result<Vec<String>, ExtractError> {
    let document = Document::load(path).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(text);
        }
    }

    Ok(pages)
}

fn failure_block(path: &Path, reason: &str) -> String {
    format!(
        "[extraction failed] could not read text from {}: {}",
        path.display(),
        reason
    )
}

fn extract_docx_blocks(path: &Path) -> Result<Vec<String>, ExtractError> {
    let bytes = fs::read(path)?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| ExtractError::Docx(error.to_string()))?;

    let mut xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|error| ExtractError::Docx(error.to_string()))?
        .read_to_end(&mut xml)
        .map_err(|error| ExtractError::Docx(error.to_string()))?;

    docx_paragraphs(&xml)
}

/// One block per `w:p` element, built from the concatenated `w:t` runs.
/// Whitespace-only paragraphs are skipped.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Text(t)) if in_text => {
                current.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        blocks.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => return Err(ExtractError::Docx(error.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(blocks)
}

fn extract_txt_block(path: &Path) -> Result<Vec<String>, ExtractError> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|error| ExtractError::Decode(error.to_string()))?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![text])
}
