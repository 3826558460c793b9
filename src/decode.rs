use std::collections::BTreeMap;

use lopdf::content::Operation;
use lopdf::{Document, Encoding, Object, ObjectId};
use thiserror::Error;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF";
const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to load PDF: {0}")]
    Load(#[source] lopdf::Error),
    #[error("failed to extract text from page {page}: {source}")]
    Page {
        page: u32,
        #[source]
        source: lopdf::Error,
    },
    #[error("document is neither PDF nor UTF-8 text")]
    NotText(#[from] std::string::FromUtf8Error),
}

/// Page texts in document order.
///
/// PDF bytes are decoded page by page; anything else is read as UTF-8 text
/// with form feeds separating pages.
pub fn decode_pages(bytes: Vec<u8>) -> Result<Vec<String>, DecodeError> {
    if bytes.starts_with(PDF_MAGIC) {
        decode_pdf(&bytes)
    } else {
        let text = String::from_utf8(bytes)?;
        Ok(text.split(PAGE_BREAK).map(str::to_string).collect())
    }
}

fn decode_pdf(bytes: &[u8]) -> Result<Vec<String>, DecodeError> {
    let doc = Document::load_mem(bytes).map_err(DecodeError::Load)?;
    // get_pages is a BTreeMap keyed by page number, so iteration is in page order
    doc.get_pages()
        .into_iter()
        .map(|(page, id)| page_text(&doc, id).map_err(|source| DecodeError::Page { page, source }))
        .collect()
}

/// Text of one page with a line break wherever the text position moves to a
/// new baseline. Runs on the same baseline are joined with a space.
fn page_text(doc: &Document, page_id: ObjectId) -> lopdf::Result<String> {
    let encodings = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .map(|(name, font)| font.get_font_encoding(doc).map(|e| (name, e)))
        .collect::<lopdf::Result<BTreeMap<Vec<u8>, Encoding>>>()?;
    let content = doc.get_and_decode_page_content(page_id)?;

    let mut text = PageText::default();
    let mut encoding = None;
    for op in &content.operations {
        match op.operator.as_str() {
            "Tf" => {
                encoding = match op.operands.first() {
                    Some(font) => encodings.get(font.as_name()?),
                    None => None,
                };
            }
            "BT" => text.y = 0.0,
            "ET" | "T*" => text.new_line(),
            "Td" | "TD" => {
                let dy = operand(op, 1);
                if dy == 0.0 {
                    text.space();
                } else {
                    text.y += dy;
                    text.new_line();
                }
            }
            "Tm" => {
                let y = operand(op, 5);
                if y == text.y {
                    text.space();
                } else {
                    text.y = y;
                    text.new_line();
                }
            }
            "Tj" | "TJ" | "'" | "\"" => {
                // ' and " move to the next line before showing
                if matches!(op.operator.as_str(), "'" | "\"") {
                    text.new_line();
                }
                match encoding {
                    Some(enc) => text.show(enc, &op.operands)?,
                    None => debug!(operator = %op.operator, "text shown without a font"),
                }
            }
            _ => {}
        }
    }
    Ok(text.out)
}

fn operand(op: &Operation, i: usize) -> f32 {
    op.operands.get(i).and_then(|o| o.as_float().ok()).unwrap_or(0.0)
}

#[derive(Default)]
struct PageText {
    out: String,
    y: f32,
}

impl PageText {
    fn new_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn space(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with(char::is_whitespace) {
            self.out.push(' ');
        }
    }

    fn show(&mut self, encoding: &Encoding, operands: &[Object]) -> lopdf::Result<()> {
        for operand in operands {
            match operand {
                Object::String(bytes, _) => self.out.push_str(&Document::decode_text(encoding, bytes)?),
                Object::Array(items) => self.show(encoding, items)?,
                // large negative kerning inside TJ is a word gap
                Object::Integer(i) if *i < -100 => self.space(),
                Object::Real(r) if *r < -100.0 => self.space(),
                _ => {}
            }
        }
        Ok(())
    }
}
