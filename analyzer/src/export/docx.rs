use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use quick_xml::escape::escape;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_CLOSE: &str = "<w:sectPr/></w:body></w:document>";

/// Minimal WordprocessingML package with one paragraph per input line.
pub fn render_docx(text: &str) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/document.xml", document_xml(text)),
    ] {
        writer
            .start_file(name, options)
            .with_context(|| format!("failed to start {name}"))?;
        writer
            .write_all(body.as_bytes())
            .with_context(|| format!("failed to write {name}"))?;
    }

    let cursor = writer.finish().context("failed to finish docx archive")?;
    Ok(cursor.into_inner())
}

fn document_xml(text: &str) -> String {
    let mut xml = String::from(DOCUMENT_OPEN);
    for line in text.lines() {
        if line.is_empty() {
            xml.push_str("<w:p/>");
        } else {
            xml.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
            xml.push_str(&escape(line));
            xml.push_str("</w:t></w:r></w:p>");
        }
    }
    xml.push_str(DOCUMENT_CLOSE);
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::docx::extract_docx_text;

    #[test]
    fn exported_paragraphs_read_back() {
        let text = "Summary\n\nRent: $900 & <utilities>\nDeposit due on signing";
        let bytes = render_docx(text).unwrap();
        assert_eq!(
            extract_docx_text(&bytes).unwrap(),
            "Summary\nRent: $900 & <utilities>\nDeposit due on signing"
        );
    }

    #[test]
    fn package_has_required_parts() {
        let bytes = render_docx("hello").unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in ["[Content_Types].xml", "_rels/.rels", "word/document.xml"] {
            assert!(names.contains(&part), "missing {part}");
        }
    }

    #[test]
    fn empty_text_is_a_valid_empty_document() {
        let bytes = render_docx("").unwrap();
        assert_eq!(extract_docx_text(&bytes).unwrap(), "");
    }
}
