//! Reference `Sheet` implementation: an `ahash` map keyed by address for
//! point lookups, plus an `rstar` R-tree of the populated addresses so
//! `for_each_in_range` doesn't have to scan the whole sheet for a narrow
//! range query (`spec.md` §6, teacher's own `rstar`-backed range index).

use ahash::AHashMap;
use rstar::{RTree, RTreeObject, AABB};

use crate::cell::Cell;
use crate::sheet::{CellAddr, Sheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexedAddr(CellAddr);

impl RTreeObject for IndexedAddr {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.0.col, self.0.row])
    }
}

#[derive(Debug, Default)]
pub struct SparseSheet {
    cells: AHashMap<CellAddr, Cell>,
    index: RTree<IndexedAddr>,
}

impl SparseSheet {
    pub fn new() -> Self {
        SparseSheet { cells: AHashMap::default(), index: RTree::new() }
    }
}

impl Sheet for SparseSheet {
    fn get(&self, addr: CellAddr) -> Option<&Cell> {
        self.cells.get(&addr)
    }

    fn get_mut(&mut self, addr: CellAddr) -> Option<&mut Cell> {
        self.cells.get_mut(&addr)
    }

    fn put(&mut self, addr: CellAddr, cell: Cell) {
        if self.cells.insert(addr, cell).is_none() {
            self.index.insert(IndexedAddr(addr));
        }
    }

    fn for_each_in_range(&self, top_left: CellAddr, bottom_right: CellAddr, visitor: &mut dyn FnMut(CellAddr, &Cell)) {
        let envelope = AABB::from_corners(
            [top_left.col, top_left.row],
            [bottom_right.col, bottom_right.row],
        );
        for indexed in self.index.locate_in_envelope(&envelope) {
            if let Some(cell) = self.cells.get(&indexed.0) {
                visitor(indexed.0, cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_query_only_visits_populated_cells_inside_the_rectangle() {
        let mut sheet = SparseSheet::new();
        sheet.put(CellAddr::new(0, 0), Cell::unparsed("1".into()));
        sheet.put(CellAddr::new(5, 5), Cell::unparsed("2".into()));
        sheet.put(CellAddr::new(100, 100), Cell::unparsed("3".into()));

        let mut seen = Vec::new();
        sheet.for_each_in_range(CellAddr::new(0, 0), CellAddr::new(10, 10), &mut |addr, _| seen.push(addr));
        seen.sort_by_key(|a| (a.col, a.row));

        assert_eq!(seen, vec![CellAddr::new(0, 0), CellAddr::new(5, 5)]);
    }

    #[test]
    fn put_overwriting_an_existing_address_does_not_duplicate_the_index_entry() {
        let mut sheet = SparseSheet::new();
        sheet.put(CellAddr::new(1, 1), Cell::unparsed("1".into()));
        sheet.put(CellAddr::new(1, 1), Cell::unparsed("2".into()));

        let mut count = 0;
        sheet.for_each_in_range(CellAddr::new(0, 0), CellAddr::new(5, 5), &mut |_, _| count += 1);
        assert_eq!(count, 1);
    }
}
