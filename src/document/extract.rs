//! Text extraction collaborators.
//!
//! Extractors turn uploaded bytes into plain text plus an optional page-offset
//! table. PDF extraction is left to the host, which plugs its own
//! [`TextExtractor`] in; plain text, DOCX and EPUB are handled here.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesText, Event};
use quick_xml::Reader;
use tracing::warn;

use super::models::DocumentType;
use super::text::collapse_whitespace;

/// Upper bound on decompressed bytes read from a single archive entry
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction errors
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("No extractor available for {0} documents")]
    Unsupported(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Missing archive entry: {0}")]
    MissingEntry(String),

    #[error("Document contains no text")]
    Empty,
}

/// Output of an extractor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    /// Monotonically increasing char offsets, one per page start, plus a
    /// trailing sentinel equal to the text length
    pub page_offsets: Option<Vec<usize>>,
}

impl ExtractedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_offsets: None,
        }
    }

    pub fn with_page_offsets(mut self, offsets: Vec<usize>) -> Self {
        self.page_offsets = Some(offsets);
        self
    }

    /// Build from per-page strings, joining pages with a newline and
    /// recording where each page starts.
    pub fn from_pages<S: AsRef<str>>(pages: &[S]) -> Self {
        let mut text = String::new();
        let mut offsets = Vec::with_capacity(pages.len() + 1);
        let mut chars = 0usize;
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                text.push('\n');
                chars += 1;
            }
            offsets.push(chars);
            text.push_str(page.as_ref());
            chars += page.as_ref().chars().count();
        }
        offsets.push(chars);
        Self {
            text,
            page_offsets: Some(offsets),
        }
    }
}

/// Converts raw document bytes into text
pub trait TextExtractor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError>;
}

/// Built-in extractor for a document type, if there is one
pub fn extractor_for(doc_type: DocumentType) -> Option<Box<dyn TextExtractor>> {
    match doc_type {
        DocumentType::Txt => Some(Box::new(PlainTextExtractor)),
        DocumentType::Docx => Some(Box::new(DocxExtractor)),
        DocumentType::Epub => Some(Box::new(EpubExtractor)),
        DocumentType::Pdf => None,
    }
}

/// UTF-8 text (invalid sequences replaced), line endings normalized
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "txt"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        Ok(ExtractedText::new(text))
    }
}

/// Paragraph text from `word/document.xml`
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let mut archive = open_archive(bytes)?;
        let xml = read_entry(&mut archive, "word/document.xml")?;
        let text = docx_paragraphs(&xml)?;
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(ExtractedText::new(text))
    }
}

/// Spine-ordered XHTML text from an EPUB package
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubExtractor;

impl TextExtractor for EpubExtractor {
    fn name(&self) -> &'static str {
        "epub"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let mut archive = open_archive(bytes)?;
        let container = read_entry(&mut archive, "META-INF/container.xml")?;
        let package_path = rootfile_path(&container)?;
        let package = read_entry(&mut archive, &package_path)?;

        let base = package_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or_default();

        let mut sections = Vec::new();
        for href in spine_hrefs(&package)? {
            let path = resolve_href(base, &href);
            let xhtml = match read_entry(&mut archive, &path) {
                Ok(xhtml) => xhtml,
                Err(ExtractError::MissingEntry(name)) => {
                    warn!("Skipping spine item {}: {} not in archive", href, name);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let text = xhtml_text(&xhtml)?;
            if !text.is_empty() {
                sections.push(text);
            }
        }

        if sections.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(ExtractedText::new(sections.join("\n\n")))
    }
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Archive(e.to_string()))
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|_| ExtractError::MissingEntry(name.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(MAX_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Archive(e.to_string()))?;
    if out.len() as u64 >= MAX_ENTRY_BYTES {
        return Err(ExtractError::Archive(format!("{name} exceeds size limit")));
    }
    Ok(out)
}

fn decode_text(text: &BytesText<'_>) -> String {
    match text.unescape() {
        Ok(s) => s.into_owned(),
        // XHTML entities such as &nbsp; are not known to the XML unescaper
        Err(_) => String::from_utf8_lossy(text).into_owned(),
    }
}

fn attribute(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// One line per `w:p`, runs concatenated
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tab" => current.push('\t'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => current.push('\n'),
                b"tab" => current.push('\t'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => current.push_str(&decode_text(&t)),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}

/// `full-path` of the first rootfile in `META-INF/container.xml`
fn rootfile_path(container: &[u8]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(container);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Err(ExtractError::MissingEntry("rootfile".to_string()))
}

/// Archive path of a manifest href relative to the package directory.
///
/// Hrefs are URI references: the fragment is dropped, percent escapes are
/// decoded and `.`/`..` segments are resolved. A leading `/` is relative to
/// the archive root.
fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let decoded = urlencoding::decode(href)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let mut segments: Vec<&str> = if decoded.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Manifest hrefs in spine order
fn spine_hrefs(package: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(package);
    let mut buf = Vec::new();
    let mut manifest: HashMap<String, String> = HashMap::new();
    let mut spine: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attribute(&e, b"id"), attribute(&e, b"href")) {
                        manifest.insert(id, href);
                    }
                }
                b"itemref" => {
                    if let Some(idref) = attribute(&e, b"idref") {
                        spine.push(idref);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(spine
        .iter()
        .filter_map(|idref| manifest.get(idref).cloned())
        .collect())
}

const BLOCK_ELEMENTS: &[&[u8]] = &[
    b"p", b"div", b"br", b"li", b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"tr", b"blockquote",
    b"section", b"pre",
];

fn flush(current: &mut String, lines: &mut Vec<String>) {
    let line = collapse_whitespace(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

/// Visible text of an XHTML body; block elements become line breaks
fn xhtml_text(xhtml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(xhtml);
    let mut buf = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"script" | b"style" | b"head") {
                    skip_depth += 1;
                } else if BLOCK_ELEMENTS.contains(&name.as_ref()) {
                    flush(&mut current, &mut lines);
                }
            }
            Ok(Event::Empty(e)) => {
                if BLOCK_ELEMENTS.contains(&e.local_name().as_ref()) {
                    flush(&mut current, &mut lines);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"script" | b"style" | b"head") {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if BLOCK_ELEMENTS.contains(&name.as_ref()) {
                    flush(&mut current, &mut lines);
                }
            }
            Ok(Event::Text(t)) if skip_depth == 0 => {
                current.push_str(&decode_text(&t));
            }
            Ok(Event::CData(c)) if skip_depth == 0 => {
                current.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    flush(&mut current, &mut lines);
    Ok(lines.join("\n"))
}
