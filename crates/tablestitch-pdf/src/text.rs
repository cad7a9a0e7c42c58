//! Positioned words from MuPDF's structured text.

use mupdf::{Page, TextPageFlags};
use tablestitch_core::{BBox, Block, TextLine, Word};

/// Text blocks of a page with word-level boxes.
pub(crate) fn text_blocks(page: &Page) -> Result<Vec<Block>, mupdf::Error> {
    let text_page = page.to_text_page(TextPageFlags::empty())?;

    let mut blocks = Vec::new();
    for block in text_page.blocks() {
        let lines: Vec<TextLine> = block
            .lines()
            .filter_map(|line| {
                let words = words_from_chars(line.chars().filter_map(|c| {
                    let q = c.quad();
                    let xs = [q.ul.x, q.ur.x, q.ll.x, q.lr.x];
                    let ys = [q.ul.y, q.ur.y, q.ll.y, q.lr.y];
                    Some((c.char()?, BBox::new(min(xs), min(ys), max(xs), max(ys))))
                }));
                if words.is_empty() {
                    return None;
                }
                let r = line.bounds();
                Some(TextLine {
                    bbox: rect(r.x0, r.y0, r.x1, r.y1),
                    words,
                })
            })
            .collect();
        if lines.is_empty() {
            continue;
        }
        let r = block.bounds();
        blocks.push(Block::Text {
            bbox: rect(r.x0, r.y0, r.x1, r.y1),
            lines,
        });
    }
    Ok(blocks)
}

fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> BBox {
    BBox::new(x0.into(), y0.into(), x1.into(), y1.into())
}

fn min(values: [f32; 4]) -> f64 {
    values.into_iter().fold(f32::INFINITY, f32::min).into()
}

fn max(values: [f32; 4]) -> f64 {
    values.into_iter().fold(f32::NEG_INFINITY, f32::max).into()
}

/// Group characters into words.
///
/// Whitespace ends a word. So does a horizontal jump wider than a fifth of
/// the character height, since MuPDF does not always emit a space between
/// text runs placed far apart on the same baseline.
pub(crate) fn words_from_chars(chars: impl IntoIterator<Item = (char, BBox)>) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut open = false;
    for (ch, bbox) in chars {
        if ch.is_whitespace() || !bbox.is_finite() {
            open = false;
            continue;
        }
        match words.last_mut() {
            Some(word) if open && bbox.x0 - word.bbox.x1 <= 0.2 * bbox.height() => {
                word.bbox = word.bbox.union(&bbox);
                word.text.push(ch);
            }
            _ => words.push(Word {
                bbox,
                text: ch.to_string(),
            }),
        }
        open = true;
    }
    words
}
