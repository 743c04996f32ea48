mod directory;
mod error;
mod scan;

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::debug;

use crate::cache::{BufferCache, PageCache};
use crate::storage::{PageError, PageId};

pub use directory::{RootRecordIter, RootRecords};
pub use error::{AccessError, AccessResult};
pub use scan::{FullScan, PageIter, RecordIter};

/// Table object identifier. A table's directory page has id equal to the
/// table's oid.
pub type Oid = u32;

/// Number of page ids reserved for root (directory) pages. Data page ids
/// are allocated above this bound.
pub const MAX_ROOT_PAGE_COUNT: u32 = 4096;

/// Oid of the system table mapping table names to oids.
pub const NAME_SYSTABLE_OID: Oid = 0;

struct CatalogState {
    max_page_id: PageId,
    name_mapping: AHashMap<String, Option<Oid>>,
}

/// Catalog and access method layer on top of a [`BufferCache`].
///
/// Each table owns a single directory page (id == oid, a root page) whose
/// records list the table's data page ids. Table names live in a system
/// table; resolved names are memoized, including misses.
///
/// Cloning yields another handle to the same catalog state.
#[derive(Clone)]
pub struct AccessMethodManager {
    cache: BufferCache,
    state: Rc<RefCell<CatalogState>>,
}

impl AccessMethodManager {
    pub fn new(cache: BufferCache) -> Self {
        Self {
            cache,
            state: Rc::new(RefCell::new(CatalogState {
                max_page_id: MAX_ROOT_PAGE_COUNT + 1,
                name_mapping: AHashMap::new(),
            })),
        }
    }

    /// Creates an empty table and writes its name record into the catalog.
    pub fn create_table(&self, table_name: &str) -> AccessResult<Oid> {
        if self.resolve(table_name).is_some() {
            return Err(AccessError::TableAlreadyExists(table_name.to_string()));
        }
        let oid = self.next_table_oid();
        self.store_name_record(&directory::oid_name_bytes(oid, table_name))?;
        self.state
            .borrow_mut()
            .name_mapping
            .insert(table_name.to_string(), Some(oid));
        debug!(table_name, oid, "created table");
        Ok(oid)
    }

    /// Creates a restartable record scan over the given table.
    pub fn create_full_scan<T, F>(&self, table_name: &str, parser: F) -> AccessResult<FullScan<T>>
    where
        F: Fn(&[u8]) -> T + 'static,
    {
        let oid = self
            .resolve(table_name)
            .ok_or_else(|| AccessError::TableNotFound(table_name.to_string()))?;
        Ok(FullScan::new(self.cache.clone(), oid, Rc::new(parser)))
    }

    /// Allocates one new data page for the table.
    pub fn add_page(&self, table_oid: Oid) -> AccessResult<PageId> {
        self.add_pages(table_oid, 1)
    }

    /// Allocates `page_count` data pages with sequential ids and registers
    /// them in the table's directory page. Returns the first id.
    pub fn add_pages(&self, table_oid: Oid, page_count: u32) -> AccessResult<PageId> {
        let first_page_id = {
            let mut state = self.state.borrow_mut();
            let first = state.max_page_id;
            state.max_page_id += page_count;
            first
        };
        let directory_page = self.cache.get_and_pin(table_oid);
        for page_id in first_page_id..first_page_id + page_count {
            let bytes = directory::oid_pageid_bytes(table_oid, page_id);
            match directory_page.put_record(&bytes, None) {
                Ok(_) => {}
                Err(PageError::OutOfSpace { .. }) => {
                    return Err(AccessError::DirectoryOverflow(table_oid));
                }
                Err(err) => return Err(err.into()),
            }
        }
        debug!(table_oid, first_page_id, page_count, "added table pages");
        Ok(first_page_id)
    }

    /// Number of data pages currently registered for the table.
    pub fn page_count(&self, table_name: &str) -> AccessResult<usize> {
        let oid = self
            .resolve(table_name)
            .ok_or_else(|| AccessError::TableNotFound(table_name.to_string()))?;
        let count = RootRecords::new(self.cache.clone(), oid, 1)
            .iter()
            .filter(|(record_oid, _)| *record_oid == oid)
            .count();
        Ok(count)
    }

    fn resolve(&self, table_name: &str) -> Option<Oid> {
        if let Some(cached) = self.state.borrow().name_mapping.get(table_name) {
            return *cached;
        }
        let found = self
            .name_records()
            .into_iter()
            .find(|(_, name)| name == table_name)
            .map(|(oid, _)| oid);
        self.state
            .borrow_mut()
            .name_mapping
            .insert(table_name.to_string(), found);
        found
    }

    fn next_table_oid(&self) -> Oid {
        self.name_records()
            .into_iter()
            .map(|(oid, _)| oid)
            .fold(NAME_SYSTABLE_OID, Oid::max)
            + 1
    }

    /// Tries the name record on every existing page of the name system
    /// table, adding a fresh page when none has room.
    fn store_name_record(&self, bytes: &[u8]) -> AccessResult<()> {
        for (oid, page_id) in RootRecords::new(self.cache.clone(), NAME_SYSTABLE_OID, 1).iter() {
            if oid != NAME_SYSTABLE_OID {
                continue;
            }
            let page = self.cache.get_and_pin(page_id);
            if page.put_record(bytes, None).is_ok() {
                return Ok(());
            }
        }
        let page_id = self.add_page(NAME_SYSTABLE_OID)?;
        let page = self.cache.get_and_pin(page_id);
        page.put_record(bytes, None)?;
        Ok(())
    }

    fn name_records(&self) -> Vec<(Oid, String)> {
        let mut records = Vec::new();
        for (oid, page_id) in RootRecords::new(self.cache.clone(), NAME_SYSTABLE_OID, 1).iter() {
            if oid != NAME_SYSTABLE_OID {
                continue;
            }
            let page = self.cache.get(page_id);
            for (_, data) in page.all_records() {
                if let crate::storage::RecordData::Live(bytes) = data {
                    if let Some(record) = directory::parse_oid_name(&bytes) {
                        records.push(record);
                    }
                }
            }
        }
        records
    }
}
