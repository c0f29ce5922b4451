//! Crawl cursor: the resumable position in the (cell, category, page) search space
//!
//! The cursor is the only mutable progress state of a crawl. It always points
//! at the next request to issue; `advance` moves it past a page once that
//! page's records have been taken into the buffer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimensions of the search space the cursor walks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSpace {
    pub cells: usize,
    pub categories: usize,
    pub page_size: usize,
}

/// A (cell, category, page) triple identifying one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub cell: usize,
    pub category: usize,
    pub page: usize,
}

/// Outcome of advancing past a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The page was full; the next page of the same category follows
    NextPage,
    /// The category is exhausted; the next category of the same cell follows
    NextCategory,
    /// The cell is exhausted; the first category of the next cell follows
    NextCell,
    /// Every cell has been searched
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCursor {
    pub cell_index: usize,
    pub category_index: usize,
    pub page_index: usize,
    pub done: bool,
}

impl CrawlCursor {
    /// Cursor at (0, 0, 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the next request, or `None` once the crawl is done
    pub fn position(&self) -> Option<Position> {
        if self.done {
            return None;
        }
        Some(Position {
            cell: self.cell_index,
            category: self.category_index,
            page: self.page_index,
        })
    }

    /// Moves past the page at the current position
    ///
    /// A page holding fewer than `space.page_size` records is the last page of
    /// its (cell, category); otherwise the next page follows.
    pub fn advance(&mut self, fetched: usize, space: SearchSpace) -> Advance {
        if self.done {
            return Advance::Done;
        }

        if fetched >= space.page_size {
            self.page_index += 1;
            return Advance::NextPage;
        }

        self.page_index = 0;
        self.category_index += 1;
        if self.category_index < space.categories {
            return Advance::NextCategory;
        }

        self.settle(space)
    }

    /// Normalises indices that point past the end of a level
    ///
    /// A cell without categories is skipped; running past the last cell marks
    /// the cursor done with `cell_index == space.cells`.
    pub fn settle(&mut self, space: SearchSpace) -> Advance {
        let mut advance = Advance::NextCategory;

        while !self.done && self.category_index >= space.categories {
            self.category_index = 0;
            self.page_index = 0;
            self.cell_index += 1;
            advance = Advance::NextCell;

            if space.categories == 0 {
                self.cell_index = self.cell_index.max(space.cells);
            }
            if self.cell_index >= space.cells {
                break;
            }
        }

        if self.cell_index >= space.cells {
            self.cell_index = space.cells;
            self.category_index = 0;
            self.page_index = 0;
            self.done = true;
            return Advance::Done;
        }

        advance
    }
}

impl fmt::Display for CrawlCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.done {
            write!(f, "(cell={}, done)", self.cell_index)
        } else {
            write!(
                f,
                "(cell={}, category={}, page={})",
                self.cell_index, self.category_index, self.page_index
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(cells: usize, categories: usize) -> SearchSpace {
        SearchSpace {
            cells,
            categories,
            page_size: 20,
        }
    }

    #[test]
    fn test_full_page_continues() {
        let mut cursor = CrawlCursor::new();
        assert_eq!(cursor.advance(20, space(2, 2)), Advance::NextPage);
        assert_eq!(cursor.page_index, 1);
        assert_eq!(cursor.category_index, 0);
    }

    #[test]
    fn test_short_page_terminates_category() {
        let mut cursor = CrawlCursor {
            page_index: 3,
            ..CrawlCursor::new()
        };
        assert_eq!(cursor.advance(19, space(2, 2)), Advance::NextCategory);
        assert_eq!(cursor.page_index, 0);
        assert_eq!(cursor.category_index, 1);
    }

    #[test]
    fn test_last_category_moves_to_next_cell() {
        let mut cursor = CrawlCursor {
            cell_index: 0,
            category_index: 1,
            page_index: 2,
            done: false,
        };
        assert_eq!(cursor.advance(0, space(2, 2)), Advance::NextCell);
        assert_eq!(
            cursor,
            CrawlCursor {
                cell_index: 1,
                category_index: 0,
                page_index: 0,
                done: false
            }
        );
    }

    #[test]
    fn test_last_cell_finishes() {
        let mut cursor = CrawlCursor {
            cell_index: 1,
            category_index: 1,
            page_index: 0,
            done: false,
        };
        assert_eq!(cursor.advance(5, space(2, 2)), Advance::Done);
        assert!(cursor.done);
        assert_eq!(cursor.cell_index, 2);
        assert_eq!(cursor.position(), None);
        assert_eq!(cursor.advance(20, space(2, 2)), Advance::Done);
    }

    #[test]
    fn test_settle_without_categories() {
        let mut cursor = CrawlCursor::new();
        assert_eq!(cursor.settle(space(3, 0)), Advance::Done);
        assert!(cursor.done);
        assert_eq!(cursor.cell_index, 3);
    }

    #[test]
    fn test_settle_empty_grid() {
        let mut cursor = CrawlCursor::new();
        assert_eq!(cursor.settle(space(0, 2)), Advance::Done);
        assert!(cursor.done);
        assert_eq!(cursor.cell_index, 0);
    }

    #[test]
    fn test_settle_keeps_valid_position() {
        let mut cursor = CrawlCursor {
            cell_index: 2,
            category_index: 1,
            page_index: 3,
            done: false,
        };
        cursor.settle(space(4, 2));
        assert_eq!(
            cursor.position(),
            Some(Position {
                cell: 2,
                category: 1,
                page: 3
            })
        );
    }

    #[test]
    fn test_walks_every_triple_once() {
        let space = space(3, 2);
        let mut cursor = CrawlCursor::new();
        let mut visited = Vec::new();
        while let Some(pos) = cursor.position() {
            visited.push((pos.cell, pos.category, pos.page));
            // Category 0 has two pages everywhere, category 1 only one
            let fetched = if pos.category == 0 && pos.page == 0 { 20 } else { 3 };
            cursor.advance(fetched, space);
        }
        assert_eq!(visited.len(), 3 * 3);
        assert_eq!(visited[0], (0, 0, 0));
        assert_eq!(visited[1], (0, 0, 1));
        assert_eq!(visited[2], (0, 1, 0));
        assert_eq!(visited[3], (1, 0, 0));
        assert_eq!(cursor.cell_index, 3);
        assert!(cursor.done);
    }
}
