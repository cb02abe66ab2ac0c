//! Bill text XML handling.
//!
//! Validates well-formedness and extracts plain text suitable for
//! summarization from the legislative XML format: the bill title, then
//! each section's number, header, and body text.
//!
//! Malformed XML is a hard failure for the entity; the document is cached
//! on disk and will not differ on a blind retry, so it is surfaced for
//! operator attention instead of retried automatically.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::types::{Result, SyncError};

/// Check well-formedness by scanning the full event stream.
pub fn validate_xml(xml: &str) -> bool {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

/// Extract plain text content for AI processing.
///
/// Returns the title and per-section text joined with newlines. Fails on
/// malformed XML; an empty extraction result is reported as a document
/// error too, since there is nothing to summarize.
pub fn extract_bill_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut lines: Vec<String> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut pending_enum: Option<String> = None;
    let mut title_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| SyncError::Document(format!("text decode failed: {e}")))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let in_section = stack.iter().any(|n| n == "section");
                match stack.last().map(String::as_str) {
                    Some("title") if !title_seen => {
                        lines.push(format!("TITLE: {text}"));
                        title_seen = true;
                    }
                    Some("enum") if in_section => {
                        pending_enum = Some(text.trim_end_matches('.').to_string());
                    }
                    Some("header") if in_section => {
                        let number = pending_enum.take().unwrap_or_default();
                        lines.push(format!("\nSECTION {number}: {text}"));
                    }
                    _ if stack.iter().any(|n| n == "text") => {
                        lines.push(text.to_string());
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SyncError::Document(format!("malformed XML: {e}")));
            }
        }
    }

    let extracted = lines.join("\n");
    if extracted.trim().is_empty() {
        return Err(SyncError::Document(
            "no extractable text content in document".into(),
        ));
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<bill>
  <title>Rural Broadband Act</title>
  <section>
    <enum>1.</enum>
    <header>Short title</header>
    <text>This Act may be cited as the Rural Broadband Act.</text>
  </section>
  <section>
    <enum>2.</enum>
    <header>Grants</header>
    <text>The Secretary shall award grants <quote>to eligible entities</quote> each fiscal year.</text>
  </section>
</bill>"#;

    #[test]
    fn test_extract_title_and_sections() {
        let text = extract_bill_text(SAMPLE).unwrap();
        assert!(text.starts_with("TITLE: Rural Broadband Act"));
        assert!(text.contains("SECTION 1: Short title"));
        assert!(text.contains("SECTION 2: Grants"));
        assert!(text.contains("This Act may be cited as the Rural Broadband Act."));
        // Text nested inside inline markup is still captured
        assert!(text.contains("to eligible entities"));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let malformed = "<bill><title>Broken</section></bill>";
        assert!(!validate_xml(malformed));
        assert!(matches!(
            extract_bill_text(malformed),
            Err(SyncError::Document(_))
        ));
    }

    #[test]
    fn test_well_formed_validation() {
        assert!(validate_xml(SAMPLE));
        assert!(validate_xml("<a><b/></a>"));
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(matches!(
            extract_bill_text("<bill><metadata>x</metadata></bill>"),
            Err(SyncError::Document(_))
        ));
    }

    #[test]
    fn test_entities_unescaped() {
        let xml = "<bill><title>Food &amp; Drug</title></bill>";
        let text = extract_bill_text(xml).unwrap();
        assert_eq!(text, "TITLE: Food & Drug");
    }
}
