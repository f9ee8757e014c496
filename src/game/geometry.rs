//! Board Geometry
//!
//! Maps between line numbers and the boxes they bound on an R×C grid of
//! boxes. Pure functions, no state.
//!
//! ## Numbering
//!
//! Lines are numbered from 1. The first `R·(C+1)` numbers are the vertical
//! lines, row-major, each row of boxes contributing `C+1` of them. The rest
//! are horizontal lines, row-major across `R+1` rows of `C` lines each.
//!
//! ```text
//!  2x2 board
//!
//!     ── 07 ──   ── 08 ──
//!    |         |         |
//!    01   b1   02   b2   03
//!    |         |         |
//!     ── 09 ──   ── 10 ──
//!    |         |         |
//!    04   b3   05   b4   06
//!    |         |         |
//!     ── 11 ──   ── 12 ──
//! ```
//!
//! Boxes are numbered from 1, row-major.

use serde::{Deserialize, Serialize};

/// 1-based line number.
pub type LineNumber = u32;

/// 1-based box index.
pub type BoxIndex = u32;

/// The four lines bounding one box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoxLines {
    /// Vertical line on the left.
    pub left: LineNumber,
    /// Vertical line on the right.
    pub right: LineNumber,
    /// Horizontal line above.
    pub top: LineNumber,
    /// Horizontal line below.
    pub bottom: LineNumber,
}

impl BoxLines {
    /// All four sides.
    pub fn as_array(&self) -> [LineNumber; 4] {
        [self.left, self.top, self.right, self.bottom]
    }

    /// Does this box have `line` as a side?
    pub fn contains(&self, line: LineNumber) -> bool {
        self.as_array().contains(&line)
    }
}

/// An R×C grid of boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid {
    rows: u32,
    cols: u32,
}

impl Grid {
    /// Create a grid of `rows` × `cols` boxes.
    ///
    /// # Panics
    ///
    /// If either dimension is zero or the line count does not fit a
    /// [`LineNumber`]. `GameConfig::validate` rejects such configurations
    /// before a grid is ever built from them.
    pub fn new(rows: u32, cols: u32) -> Self {
        match Self::try_new(rows, cols) {
            Some(grid) => grid,
            None => panic!("unsupported grid dimensions {}x{}", rows, cols),
        }
    }

    /// A grid of `rows` × `cols` boxes, or `None` when either dimension is
    /// zero or `R·(C+1) + C·(R+1)` overflows a [`LineNumber`].
    pub fn try_new(rows: u32, cols: u32) -> Option<Self> {
        if rows == 0 || cols == 0 {
            return None;
        }
        let vertical = rows.checked_mul(cols.checked_add(1)?)?;
        let horizontal = cols.checked_mul(rows.checked_add(1)?)?;
        vertical.checked_add(horizontal)?;
        Some(Self { rows, cols })
    }

    /// Rows of boxes.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Columns of boxes.
    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Total boxes, `R·C`.
    #[inline]
    pub fn box_count(&self) -> u32 {
        self.rows * self.cols
    }

    /// Number of vertical lines, `R·(C+1)`.
    #[inline]
    pub fn vertical_line_count(&self) -> u32 {
        self.rows * (self.cols + 1)
    }

    /// Number of horizontal lines, `C·(R+1)`.
    #[inline]
    pub fn horizontal_line_count(&self) -> u32 {
        self.cols * (self.rows + 1)
    }

    /// `R·(C+1) + C·(R+1)`.
    #[inline]
    pub fn total_lines(&self) -> u32 {
        self.vertical_line_count() + self.horizontal_line_count()
    }

    /// Is `line` within `[1, total_lines]`?
    #[inline]
    pub fn is_valid_line(&self, line: LineNumber) -> bool {
        (1..=self.total_lines()).contains(&line)
    }

    /// The lines bounding `box_index`, or `None` outside `[1, R·C]`.
    pub fn box_lines(&self, box_index: BoxIndex) -> Option<BoxLines> {
        if !(1..=self.box_count()).contains(&box_index) {
            return None;
        }

        // 0-based row, ceil(box/C) - 1
        let row = (box_index - 1) / self.cols;
        let left = box_index + row;
        let top = self.vertical_line_count() + box_index;

        Some(BoxLines {
            left,
            right: left + 1,
            top,
            bottom: top + self.cols,
        })
    }

    /// The one or two boxes that have `line` as a side, ascending.
    ///
    /// Empty for an out-of-range line.
    pub fn line_boxes(&self, line: LineNumber) -> Vec<BoxIndex> {
        if !self.is_valid_line(line) {
            return Vec::new();
        }

        let verticals = self.vertical_line_count();
        let mut boxes = Vec::with_capacity(2);

        if line <= verticals {
            let offset = line - 1;
            let row = offset / (self.cols + 1);
            let col = offset % (self.cols + 1);
            // Box to the left, then box to the right.
            if col > 0 {
                boxes.push(row * self.cols + col);
            }
            if col < self.cols {
                boxes.push(row * self.cols + col + 1);
            }
        } else {
            let offset = line - verticals - 1;
            let edge_row = offset / self.cols;
            let col = offset % self.cols;
            // Box above, then box below.
            if edge_row > 0 {
                boxes.push((edge_row - 1) * self.cols + col + 1);
            }
            if edge_row < self.rows {
                boxes.push(edge_row * self.cols + col + 1);
            }
        }

        boxes
    }

    /// Iterate over every box with its sides.
    pub fn boxes(&self) -> impl Iterator<Item = (BoxIndex, BoxLines)> + '_ {
        (1..=self.box_count()).filter_map(move |b| self.box_lines(b).map(|lines| (b, lines)))
    }
}
