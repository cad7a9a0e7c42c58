use serde::{Deserialize, Serialize};

use crate::model::{BBox, Point};

/// A vector-drawing primitive painted on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Line { from: Point, to: Point },
    Rect(BBox),
}

impl Shape {
    pub fn is_finite(&self) -> bool {
        match self {
            Shape::Line { from, to } => from.is_finite() && to.is_finite(),
            Shape::Rect(b) => b.is_finite(),
        }
    }
}

/// A whitespace-delimited run of characters with its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub bbox: BBox,
    pub text: String,
}

impl Word {
    pub fn new(text: &str, bbox: BBox) -> Self {
        Self {
            bbox,
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub bbox: BBox,
    pub words: Vec<Word>,
}

impl TextLine {
    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Text { bbox: BBox, lines: Vec<TextLine> },
    Image { bbox: BBox },
}

impl Block {
    pub fn bbox(&self) -> BBox {
        match self {
            Block::Text { bbox, .. } | Block::Image { bbox } => *bbox,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Block::Image { .. })
    }

    /// Text lines of a text block; empty for images.
    pub fn lines(&self) -> &[TextLine] {
        match self {
            Block::Text { lines, .. } => lines,
            Block::Image { .. } => &[],
        }
    }
}

/// Geometry and text of a single page, as supplied by a [`crate::PageSource`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageLayout {
    /// 1-based page number.
    pub number: u32,
    pub width: f64,
    pub height: f64,
    pub shapes: Vec<Shape>,
    pub blocks: Vec<Block>,
    /// Set when the page's vector drawings could not be read.
    pub geometry_error: Option<String>,
}

impl PageLayout {
    pub fn new(number: u32, width: f64, height: f64) -> Self {
        Self {
            number,
            width,
            height,
            ..Self::default()
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn text_lines(&self) -> impl Iterator<Item = &TextLine> {
        self.blocks.iter().flat_map(Block::lines)
    }

    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.text_lines().flat_map(|l| l.words.iter())
    }

    pub fn image_blocks(&self) -> impl Iterator<Item = &BBox> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Image { bbox } => Some(bbox),
            Block::Text { .. } => None,
        })
    }

    /// Number of non-whitespace text characters on the page.
    pub fn text_char_count(&self) -> usize {
        self.words().map(|w| w.text.chars().count()).sum()
    }
}
