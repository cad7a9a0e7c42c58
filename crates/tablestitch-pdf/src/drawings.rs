//! Vector drawings recovered from a page content stream with lopdf.
//!
//! Only what the border classifier and the lattice backend need is tracked:
//! the transformation matrix stack, straight path segments, rectangles and
//! image placements. Text, colour and clipping operators are skipped, and
//! form XObjects are not entered.

use std::collections::HashSet;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use tablestitch_core::{BBox, Point, Shape};

/// US Letter, for pages that inherit no MediaBox.
const LETTER: BBox = BBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Guard against `Parent` cycles in broken page trees.
const MAX_TREE_DEPTH: usize = 32;

/// Shapes and image rectangles of one page, in top-left page coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Drawings {
    pub shapes: Vec<Shape>,
    pub images: Vec<BBox>,
}

/// Read the drawings of a page.
pub(crate) fn page_drawings(doc: &Document, page_id: ObjectId) -> Result<Drawings, lopdf::Error> {
    let content = Content::decode(&doc.get_page_content(page_id)?)?;
    let media_box = media_box(doc, page_id).unwrap_or(LETTER);
    let images = image_xobjects(doc, page_id);
    Ok(interpret(&content.operations, media_box, &images))
}

/// Run the path and XObject operators of a content stream.
///
/// `media_box` is in PDF user space (origin bottom-left); output coordinates
/// are flipped so `y` grows downwards from its top edge. `image_names` are
/// the XObject resource names that refer to images.
pub(crate) fn interpret(
    operations: &[Operation],
    media_box: BBox,
    image_names: &HashSet<Vec<u8>>,
) -> Drawings {
    let mut state = Interpreter {
        ctm: Matrix::IDENTITY,
        saved: Vec::new(),
        media_box,
        path: Vec::new(),
        current: None,
        subpath_start: None,
        out: Drawings::default(),
    };
    for op in operations {
        if state.step(op, image_names).is_none() {
            tracing::trace!(operator = %op.operator, "skipping malformed operator");
        }
    }
    state.out
}

/// Affine transform `[a b c d e f]` as written in a `cm` operator.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// `self` followed by `next`.
    fn then(&self, next: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = next.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Maps axis-aligned rectangles to axis-aligned rectangles.
    fn keeps_axes(&self) -> bool {
        let [a, b, c, d, _, _] = self.0;
        (b == 0.0 && c == 0.0) || (a == 0.0 && d == 0.0)
    }
}

enum PathItem {
    Segment(Point, Point),
    Rect(BBox),
}

struct Interpreter {
    ctm: Matrix,
    saved: Vec<Matrix>,
    media_box: BBox,
    path: Vec<PathItem>,
    /// Current point and subpath start, already in page coordinates.
    current: Option<Point>,
    subpath_start: Option<Point>,
    out: Drawings,
}

impl Interpreter {
    fn to_page(&self, x: f64, y: f64) -> Point {
        let (x, y) = self.ctm.apply(x, y);
        Point::new(x - self.media_box.x0, self.media_box.y1 - y)
    }

    fn step(&mut self, op: &Operation, image_names: &HashSet<Vec<u8>>) -> Option<()> {
        let args = &op.operands;
        match op.operator.as_str() {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                let [a, b, c, d, e, f] = numbers::<6>(args)?;
                self.ctm = Matrix([a, b, c, d, e, f]).then(&self.ctm);
            }
            "m" => {
                let [x, y] = numbers::<2>(args)?;
                let p = self.to_page(x, y);
                self.current = Some(p);
                self.subpath_start = Some(p);
            }
            "l" => {
                let [x, y] = numbers::<2>(args)?;
                let p = self.to_page(x, y);
                if let Some(from) = self.current {
                    self.path.push(PathItem::Segment(from, p));
                }
                self.current = Some(p);
            }
            // Curves move the current point but are never rules
            "c" | "v" | "y" => {
                let [x, y] = last_point(args)?;
                self.current = Some(self.to_page(x, y));
            }
            "re" => {
                let [x, y, w, h] = numbers::<4>(args)?;
                self.rect(x, y, w, h);
            }
            "h" => self.close(),
            "S" | "f" | "F" | "f*" | "B" | "B*" => self.paint(),
            "s" | "b" | "b*" => {
                self.close();
                self.paint();
            }
            "n" => self.discard(),
            "Do" => {
                let name = args.first()?.as_name().ok()?;
                if image_names.contains(name) {
                    self.image();
                }
            }
            _ => {}
        }
        Some(())
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let corners = [
            self.to_page(x, y),
            self.to_page(x + w, y),
            self.to_page(x + w, y + h),
            self.to_page(x, y + h),
        ];
        if self.ctm.keeps_axes() {
            self.path
                .push(PathItem::Rect(BBox::from_points(corners[0], corners[2])));
        } else {
            for i in 0..4 {
                self.path
                    .push(PathItem::Segment(corners[i], corners[(i + 1) % 4]));
            }
        }
        self.current = Some(corners[0]);
        self.subpath_start = Some(corners[0]);
    }

    fn close(&mut self) {
        if let (Some(from), Some(to)) = (self.current, self.subpath_start)
            && from != to
        {
            self.path.push(PathItem::Segment(from, to));
        }
        self.current = self.subpath_start;
    }

    fn paint(&mut self) {
        for item in self.path.drain(..) {
            self.out.shapes.push(match item {
                PathItem::Segment(from, to) => Shape::Line { from, to },
                PathItem::Rect(bbox) => Shape::Rect(bbox),
            });
        }
        self.current = None;
        self.subpath_start = None;
    }

    fn discard(&mut self) {
        self.path.clear();
        self.current = None;
        self.subpath_start = None;
    }

    /// Images are painted into the unit square of the current CTM.
    fn image(&mut self) {
        let corners = [
            self.to_page(0.0, 0.0),
            self.to_page(1.0, 0.0),
            self.to_page(0.0, 1.0),
            self.to_page(1.0, 1.0),
        ];
        let bbox = corners[1..]
            .iter()
            .fold(BBox::from_points(corners[0], corners[0]), |acc, p| {
                acc.union(&BBox::from_points(*p, *p))
            });
        self.out.images.push(bbox);
    }
}

fn number(obj: &Object) -> Option<f64> {
    match *obj {
        Object::Integer(i) => Some(i as f64),
        Object::Real(r) => Some(f64::from(r)),
        _ => None,
    }
}

fn numbers<const N: usize>(args: &[Object]) -> Option<[f64; N]> {
    if args.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(args) {
        *slot = number(obj)?;
    }
    Some(out)
}

fn last_point(args: &[Object]) -> Option<[f64; 2]> {
    numbers(args.get(args.len().checked_sub(2)?..)?)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, walking up the page tree for inherited ones.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(obj) = dict.get(key) {
            return resolve(doc, obj);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<BBox> {
    let values = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    let [x0, y0, x1, y1] = numbers::<4>(values)?;
    Some(BBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
}

/// Names of the page's XObject resources whose subtype is `Image`.
fn image_xobjects(doc: &Document, page_id: ObjectId) -> HashSet<Vec<u8>> {
    let Some(xobjects) = inherited(doc, page_id, b"Resources")
        .and_then(|r| r.as_dict().ok())
        .and_then(|r| r.get(b"XObject").ok())
        .and_then(|x| resolve(doc, x))
        .and_then(|x| x.as_dict().ok())
    else {
        return HashSet::new();
    };

    xobjects
        .iter()
        .filter(|(_, obj)| {
            resolve(doc, obj)
                .and_then(|o| o.as_stream().ok())
                .and_then(|s| s.dict.get(b"Subtype").ok())
                .and_then(|t| t.as_name().ok())
                == Some(b"Image".as_slice())
        })
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: BBox = BBox {
        x0: 0.0,
        y0: 0.0,
        x1: 600.0,
        y1: 800.0,
    };

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn run(ops: Vec<Operation>) -> Drawings {
        let images = HashSet::from([b"Im1".to_vec()]);
        interpret(&ops, PAGE, &images)
    }

    #[test]
    fn test_stroked_line_flipped() {
        let d = run(vec![
            op("m", vec![50.into(), 700.into()]),
            op("l", vec![250.into(), 700.into()]),
            op("S", vec![]),
        ]);
        assert_eq!(
            d.shapes,
            vec![Shape::Line {
                from: Point::new(50.0, 100.0),
                to: Point::new(250.0, 100.0),
            }]
        );
    }

    #[test]
    fn test_filled_rect() {
        let d = run(vec![
            op("re", vec![50.into(), 600.into(), 200.into(), 100.into()]),
            op("f", vec![]),
        ]);
        assert_eq!(d.shapes, vec![Shape::Rect(BBox::new(50.0, 100.0, 250.0, 200.0))]);
    }

    #[test]
    fn test_save_restore_ctm() {
        let d = run(vec![
            op("q", vec![]),
            op("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 0.into()]),
            op("re", vec![0.into(), 0.into(), 10.into(), 10.into()]),
            op("S", vec![]),
            op("Q", vec![]),
            op("re", vec![0.into(), 0.into(), 10.into(), 10.into()]),
            op("S", vec![]),
        ]);
        assert_eq!(
            d.shapes,
            vec![
                Shape::Rect(BBox::new(100.0, 790.0, 110.0, 800.0)),
                Shape::Rect(BBox::new(0.0, 790.0, 10.0, 800.0)),
            ]
        );
    }

    #[test]
    fn test_end_path_discards() {
        let d = run(vec![
            op("m", vec![0.into(), 0.into()]),
            op("l", vec![100.into(), 0.into()]),
            op("n", vec![]),
            op("S", vec![]),
        ]);
        assert!(d.shapes.is_empty());
    }

    #[test]
    fn test_close_and_stroke_adds_closing_segment() {
        let d = run(vec![
            op("m", vec![0.into(), 0.into()]),
            op("l", vec![10.into(), 0.into()]),
            op("l", vec![10.into(), 10.into()]),
            op("s", vec![]),
        ]);
        assert_eq!(d.shapes.len(), 3);
        assert_eq!(
            d.shapes[2],
            Shape::Line {
                from: Point::new(10.0, 790.0),
                to: Point::new(0.0, 800.0),
            }
        );
    }

    #[test]
    fn test_skewed_rect_becomes_segments() {
        let d = run(vec![
            op("cm", vec![1.into(), 0.into(), 1.into(), 1.into(), 0.into(), 0.into()]),
            op("re", vec![0.into(), 0.into(), 10.into(), 10.into()]),
            op("S", vec![]),
        ]);
        assert_eq!(d.shapes.len(), 4);
        assert!(d.shapes.iter().all(|s| matches!(s, Shape::Line { .. })));
    }

    #[test]
    fn test_image_placement() {
        let d = run(vec![
            op("q", vec![]),
            op("cm", vec![200.into(), 0.into(), 0.into(), 100.into(), 50.into(), 500.into()]),
            op("Do", vec![Object::Name(b"Im1".to_vec())]),
            op("Q", vec![]),
            // A form XObject, not an image
            op("Do", vec![Object::Name(b"Fm1".to_vec())]),
        ]);
        assert_eq!(d.images, vec![BBox::new(50.0, 200.0, 250.0, 300.0)]);
        assert!(d.shapes.is_empty());
    }

    #[test]
    fn test_malformed_operands_skipped() {
        let d = run(vec![
            op("m", vec![Object::Name(b"x".to_vec())]),
            op("l", vec![10.into()]),
            op("re", vec![0.into(), 0.into(), 10.into(), 10.into()]),
            op("f", vec![]),
        ]);
        assert_eq!(d.shapes, vec![Shape::Rect(BBox::new(0.0, 790.0, 10.0, 800.0))]);
    }

    #[test]
    fn test_matrix_composition() {
        let scale = Matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let shift = Matrix([1.0, 0.0, 0.0, 1.0, 5.0, 7.0]);
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (7.0, 9.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (12.0, 16.0));
    }
}
