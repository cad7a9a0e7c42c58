use tablestitch_core::{BBox, Block, PageLayout};

/// Text surrounding a table: up to `range` text blocks strictly above it and
/// `range` strictly below, nearest first, rendered in reading order.
///
/// The two sides are separated by a single newline; an empty side adds
/// nothing, so a table with no text around it gets an empty context.
pub fn table_context(page: &PageLayout, bbox: &BBox, range: usize) -> String {
    if range == 0 {
        return String::new();
    }

    let mut above: Vec<&Block> = Vec::new();
    let mut below: Vec<&Block> = Vec::new();
    for block in &page.blocks {
        if block.is_image() {
            continue;
        }
        let b = block.bbox();
        if b.y1 < bbox.y0 {
            above.push(block);
        } else if b.y0 > bbox.y1 {
            below.push(block);
        }
    }

    above.sort_by(|a, b| b.bbox().y1.total_cmp(&a.bbox().y1));
    below.sort_by(|a, b| a.bbox().y0.total_cmp(&b.bbox().y0));
    above.truncate(range);
    below.truncate(range);
    above.reverse();

    let above = join_blocks(&above);
    let below = join_blocks(&below);
    [above.trim(), below.trim()]
        .into_iter()
        .filter(|side| !side.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_blocks(blocks: &[&Block]) -> String {
    blocks
        .iter()
        .map(|block| {
            block
                .lines()
                .iter()
                .map(|line| line.text())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
