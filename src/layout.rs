//! Reading-order reconstruction of OCR text blocks
//!
//! Engines report text as spatially located fragments. This module puts them
//! back together top-to-bottom, left-to-right: fragments on the same visual row
//! are joined with a fixed gap, and each new row starts a new paragraph.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Blocks whose `y0` differ by less than this are on the same visual row
pub const ROW_THRESHOLD: f32 = 20.0;
/// Separator between fragments on the same row
pub const ROW_GAP: &str = "    ";
/// Separator between rows
pub const PARAGRAPH_BREAK: &str = "\n\n";
/// Returned instead of an empty string when nothing was recognized
pub const NO_TEXT_FOUND: &str = "No text was found in the image.";

/// Bounding box in image pixel coordinates (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest box covering both `self` and `other`
    #[cfg_attr(not(feature = "engine-leptess"), allow(dead_code))]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One spatially located fragment of OCR output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub bbox: BoundingBox,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Reassemble OCR blocks into reading-order text.
///
/// Returns [`NO_TEXT_FOUND`] when there are no blocks or every block is blank.
pub fn reconstruct(blocks: &[TextBlock]) -> String {
    let ordered = sort_reading_order(blocks);

    let mut output = String::new();
    let mut current_row_y: Option<f32> = None;

    for block in ordered {
        let text = block.text.trim();
        let y0 = block.bbox.y0;

        match current_row_y {
            Some(row_y) if y0 - row_y < ROW_THRESHOLD => {
                output.push_str(ROW_GAP);
            }
            Some(_) => {
                output.push_str(PARAGRAPH_BREAK);
                current_row_y = Some(y0);
            }
            None => {
                current_row_y = Some(y0);
            }
        }

        output.push_str(text);
    }

    let text = output.trim();
    if text.is_empty() {
        return NO_TEXT_FOUND.to_string();
    }

    text.to_string()
}

/// Row-aware ordering between two blocks.
///
/// Not a total order: proximity is judged per pair, so `a ~ b` and `b ~ c`
/// does not imply `a ~ c`.
fn compare_reading_order(a: &TextBlock, b: &TextBlock) -> Ordering {
    if (a.bbox.y0 - b.bbox.y0).abs() < ROW_THRESHOLD {
        a.bbox.x0.total_cmp(&b.bbox.x0)
    } else {
        a.bbox.y0.total_cmp(&b.bbox.y0)
    }
}

/// Stable insertion sort with [`compare_reading_order`].
///
/// `slice::sort_by` may panic when the comparator is inconsistent, so the
/// ordering is applied by hand: each block moves left past every predecessor
/// that compares strictly greater.
fn sort_reading_order(blocks: &[TextBlock]) -> Vec<&TextBlock> {
    let mut ordered: Vec<&TextBlock> = Vec::with_capacity(blocks.len());

    for block in blocks {
        let mut index = ordered.len();
        while index > 0 && compare_reading_order(block, ordered[index - 1]) == Ordering::Less {
            index -= 1;
        }
        ordered.insert(index, block);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str, x0: f32, y0: f32) -> TextBlock {
        TextBlock::new(text, BoundingBox::new(x0, y0, x0 + 40.0, y0 + 12.0))
    }

    #[test]
    fn test_groups_nearby_blocks_into_row_ordered_by_x() {
        let blocks = vec![
            block("right", 50.0, 10.0),
            block("left", 10.0, 12.0),
            block("below", 0.0, 100.0),
        ];

        assert_eq!(reconstruct(&blocks), "left    right\n\nbelow");
    }

    #[test]
    fn test_difference_of_exactly_threshold_starts_new_paragraph() {
        let blocks = vec![block("first", 0.0, 10.0), block("second", 0.0, 30.0)];
        assert_eq!(reconstruct(&blocks), "first\n\nsecond");
    }

    #[test]
    fn test_difference_just_under_threshold_stays_on_row() {
        let blocks = vec![block("first", 0.0, 10.0), block("second", 60.0, 29.5)];
        assert_eq!(reconstruct(&blocks), "first    second");
    }

    #[test]
    fn test_empty_input_returns_sentinel() {
        assert_eq!(reconstruct(&[]), NO_TEXT_FOUND);
    }

    #[test]
    fn test_blank_blocks_return_sentinel() {
        let blocks = vec![block("   ", 0.0, 0.0), block("\n\t", 0.0, 200.0)];
        assert_eq!(reconstruct(&blocks), NO_TEXT_FOUND);
    }

    #[test]
    fn test_trims_block_text() {
        let blocks = vec![block("  Hello \n", 0.0, 0.0), block("\tWorld  ", 80.0, 2.0)];
        assert_eq!(reconstruct(&blocks), "Hello    World");
    }

    #[test]
    fn test_output_has_no_leading_separator_from_blank_block() {
        let blocks = vec![block("   ", 0.0, 0.0), block("B", 60.0, 2.0)];
        assert_eq!(reconstruct(&blocks), "B");

        let blocks = vec![
            block("", 0.0, 0.0),
            block("Below", 0.0, 100.0),
            block(" ", 0.0, 200.0),
        ];
        assert_eq!(reconstruct(&blocks), "Below");
    }

    #[test]
    fn test_orders_rows_top_to_bottom() {
        let blocks = vec![
            block("third", 0.0, 300.0),
            block("first", 0.0, 0.0),
            block("second", 0.0, 150.0),
        ];
        assert_eq!(reconstruct(&blocks), "first\n\nsecond\n\nthird");
    }

    #[test]
    fn test_row_anchor_is_not_updated_within_a_row() {
        // Each step is under the threshold, but the third block is 24px below
        // the row anchor, so it opens a new paragraph.
        let blocks = vec![
            block("a", 0.0, 0.0),
            block("b", 50.0, 12.0),
            block("c", 100.0, 24.0),
        ];
        assert_eq!(reconstruct(&blocks), "a    b\n\nc");
    }

    #[test]
    fn test_block_above_anchor_joins_the_row() {
        let blocks = vec![block("anchor", 0.0, 40.0), block("higher", 90.0, 25.0)];
        assert_eq!(reconstruct(&blocks), "anchor    higher");
    }

    #[test]
    fn test_is_deterministic() {
        let blocks = vec![
            block("d", 5.0, 61.0),
            block("a", 70.0, 3.0),
            block("c", 30.0, 44.0),
            block("b", 10.0, 18.0),
        ];
        assert_eq!(reconstruct(&blocks), reconstruct(&blocks));
    }

    #[test]
    fn test_input_is_not_reordered() {
        let blocks = vec![block("second", 0.0, 100.0), block("first", 0.0, 0.0)];
        let snapshot = blocks.clone();
        let _ = reconstruct(&blocks);
        assert_eq!(blocks, snapshot);
    }

    #[test]
    fn test_union_covers_both_boxes() {
        let a = BoundingBox::new(10.0, 5.0, 20.0, 15.0);
        let b = BoundingBox::new(0.0, 8.0, 30.0, 12.0);
        assert_eq!(a.union(&b), BoundingBox::new(0.0, 5.0, 30.0, 15.0));
    }
}
