use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::page::DiskPage;
use super::{PAGE_SIZE, PageId};

/// Emulated seek cost of one random page access, in milliseconds.
const RANDOM_ACCESS_COST: f64 = 5.0;
/// Per-page transfer cost of a sequential run: one eighth of a 5400 rpm
/// rotation, since a page spans 8 of the 64 sectors on a track.
const SEQ_PAGE_COST: f64 = 1.3;

/// Handle shared between a buffer cache and the code that seeded the
/// emulator (typically a test asserting on access cost).
pub type SharedStorage = Rc<RefCell<DiskEmulator>>;

/// An in-memory block device that persists fixed-size pages by id and
/// models the cost difference between random and sequential access.
///
/// Random reads and writes each add a fixed seek cost. A completed bulk
/// operation instead *sets* the cumulative cost to the per-page sequential
/// cost times the run length: the counter is an instantaneous rate reset,
/// not an accumulator, which lets callers observe that a contiguous run is
/// cheaper than the same number of seeks.
pub struct DiskEmulator {
    pages: BTreeMap<PageId, Vec<u8>>,
    access_cost: f64,
}

impl DiskEmulator {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            access_cost: 0.0,
        }
    }

    pub fn new_shared() -> SharedStorage {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn total_access_cost(&self) -> f64 {
        self.access_cost
    }

    /// Reads a single page, lazily materializing an all-zero page for ids
    /// that were never written.
    pub fn read(&mut self, page_id: PageId) -> DiskPage {
        let page = self.fetch(page_id);
        self.access_cost += RANDOM_ACCESS_COST;
        page
    }

    /// Reads `page_count` pages in ascending id order, invoking `reader` once
    /// per page. `None` starts at the first unused id.
    pub fn bulk_read(
        &mut self,
        start_page_id: Option<PageId>,
        page_count: usize,
        mut reader: impl FnMut(DiskPage),
    ) {
        let start = start_page_id.unwrap_or_else(|| self.next_page_id());
        for page_id in start..start + page_count as PageId {
            reader(self.fetch(page_id));
        }
        self.access_cost = SEQ_PAGE_COST * page_count as f64;
    }

    /// Persists a page at the location given by its id.
    pub fn write(&mut self, page: &DiskPage) {
        self.pages.insert(page.id(), page.raw_bytes().to_vec());
        self.access_cost += RANDOM_ACCESS_COST;
    }

    /// Starts a sequential write run at `start_page_id` (`None` = first
    /// unused id). Pages handed to the writer land at consecutive ids;
    /// finishing the writer charges the sequential cost for the whole run.
    pub fn bulk_write(&mut self, start_page_id: Option<PageId>) -> BulkWriter<'_> {
        let next_id = start_page_id.unwrap_or_else(|| self.next_page_id());
        self.access_cost += RANDOM_ACCESS_COST;
        BulkWriter {
            disk: self,
            next_id,
            pages_written: 0,
        }
    }

    fn next_page_id(&self) -> PageId {
        self.pages
            .last_key_value()
            .map(|(id, _)| id + 1)
            .unwrap_or(0)
    }

    fn fetch(&mut self, page_id: PageId) -> DiskPage {
        let bytes = self
            .pages
            .entry(page_id)
            .or_insert_with(|| vec![0u8; PAGE_SIZE])
            .clone();
        DiskPage::from_bytes(page_id, bytes)
    }
}

impl Default for DiskEmulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful sequential writer returned by [`DiskEmulator::bulk_write`].
pub struct BulkWriter<'a> {
    disk: &'a mut DiskEmulator,
    next_id: PageId,
    pages_written: usize,
}

impl BulkWriter<'_> {
    /// Persists `page` at the next sequential id and returns the page as
    /// stored at its final location.
    pub fn write(&mut self, page: &DiskPage) -> DiskPage {
        let relocated = DiskPage::from_bytes(self.next_id, page.raw_bytes().to_vec());
        self.disk
            .pages
            .insert(self.next_id, page.raw_bytes().to_vec());
        self.next_id += 1;
        self.pages_written += 1;
        relocated
    }

    /// End-of-stream marker. Dropping the writer has the same effect.
    pub fn finish(self) {}
}

impl Drop for BulkWriter<'_> {
    fn drop(&mut self) {
        self.disk.access_cost = SEQ_PAGE_COST * self.pages_written as f64;
    }
}
