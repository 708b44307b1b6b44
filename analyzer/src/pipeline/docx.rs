use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use quick_xml::{Reader, events::Event};
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

/// Text of every non-empty paragraph of a `.docx`, in document order, one per line.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("not a zip archive")?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .with_context(|| format!("archive has no {DOCUMENT_PART}"))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .with_context(|| format!("{DOCUMENT_PART} is not valid UTF-8"))?;

    let paragraphs = paragraphs_from_xml(&xml)?;
    Ok(paragraphs.join("\n"))
}

/// Body paragraphs only: text-box content (`w:txbxContent`) is skipped, and
/// tabs and breaks count only inside runs so tab-stop definitions in `w:pPr`
/// never reach the text.
fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut run_depth = 0usize;
    let mut text_box_depth = 0usize;
    let mut in_text = false;

    loop {
        let event = reader.read_event().context("malformed document XML")?;
        if text_box_depth > 0 {
            match event {
                Event::Start(e) if e.name().as_ref() == b"w:txbxContent" => text_box_depth += 1,
                Event::End(e) if e.name().as_ref() == b"w:txbxContent" => text_box_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current.clear(),
                b"w:r" => run_depth += 1,
                b"w:t" if run_depth > 0 => in_text = true,
                b"w:txbxContent" => text_box_depth = 1,
                _ => {}
            },
            Event::Empty(e) if run_depth > 0 => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().context("bad text escape")?);
            }
            Event::CData(t) if in_text => {
                current.push_str(&String::from_utf8_lossy(&t));
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:p" => {
                    if !current.is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::{ZipWriter, write::SimpleFileOptions};

    fn docx_with(document_xml: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn joins_runs_and_skips_empty_paragraphs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Lease </w:t></w:r><w:r><w:t xml:space="preserve">Agreement</w:t></w:r></w:p>
    <w:p></w:p>
    <w:p/>
    <w:p><w:r><w:t>Rent &amp; Deposit</w:t><w:tab/><w:t>$500</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_docx_text(&docx_with(xml)).unwrap();
        assert_eq!(text, "Lease Agreement\nRent & Deposit\t$500");
    }

    #[test]
    fn whitespace_between_tags_is_not_text() {
        let xml = "<w:document><w:body><w:p>\n  <w:r>\n <w:t>One</w:t>\n</w:r>\n</w:p></w:body></w:document>";
        assert_eq!(extract_docx_text(&docx_with(xml)).unwrap(), "One");
    }

    #[test]
    fn tab_stop_definitions_are_not_text() {
        let xml = r#"<w:document><w:body><w:p>
<w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/><w:tab w:val="right" w:pos="9360"/></w:tabs></w:pPr>
<w:r><w:t>Rent</w:t></w:r>
</w:p></w:body></w:document>"#;
        assert_eq!(extract_docx_text(&docx_with(xml)).unwrap(), "Rent");
    }

    #[test]
    fn text_boxes_do_not_clobber_the_outer_paragraph() {
        let xml = r#"<w:document><w:body><w:p>
<w:r><w:t>Before</w:t></w:r>
<w:r><w:drawing><wps:txbx><w:txbxContent><w:p><w:r><w:t>Box</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></w:r>
<w:r><w:t xml:space="preserve"> After</w:t></w:r>
</w:p>
<w:p><w:r><w:t>Next</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(
            extract_docx_text(&docx_with(xml)).unwrap(),
            "Before After\nNext"
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(extract_docx_text(b"%PDF-1.4 not a zip").is_err());
    }

    #[test]
    fn zip_without_document_part_is_an_error() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("hello.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hi").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(extract_docx_text(&bytes).is_err());
    }
}
