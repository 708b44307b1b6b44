use anyhow::{Context, Result};
use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 11;
const LEADING: i64 = 14;
const WRAP_CHARS: usize = 95;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

/// Lays `text` out as Helvetica on A4 pages, one input line per paragraph,
/// wrapping long lines on word boundaries.
pub fn render_pdf(text: &str) -> Result<Vec<u8>> {
    let lines = layout_lines(text);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    });

    let mut kids = Vec::new();
    for page_lines in lines.chunks(LINES_PER_PAGE) {
        let content = page_content(page_lines);
        let encoded = content.encode().context("failed to encode page content")?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => Object::Reference(resources_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .context("failed to serialize PDF document")?;
    Ok(buffer)
}

fn page_content(lines: &[String]) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Integer(FONT_SIZE)],
        ),
        Operation::new("TL", vec![Object::Integer(LEADING)]),
        Operation::new(
            "Td",
            vec![
                Object::Integer(MARGIN),
                Object::Integer(PAGE_HEIGHT - MARGIN),
            ],
        ),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

/// Standard-14 fonts only cover Latin-1 reliably; anything outside ASCII
/// prints as `?`.
fn layout_lines(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.lines() {
        let cleaned: String = paragraph
            .chars()
            .map(|c| match c {
                '\t' => ' ',
                c if c.is_ascii() && !c.is_ascii_control() => c,
                _ => '?',
            })
            .collect();
        out.extend(wrap(&cleaned, WRAP_CHARS));
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let mut word = word;
        while word.len() > width {
            if !current.is_empty() {
                wrapped.push(std::mem::take(&mut current));
            }
            let (head, tail) = word.split_at(width);
            wrapped.push(head.to_string());
            word = tail;
        }
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            wrapped.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    wrapped.push(current);
    wrapped
}
