use std::rc::Rc;

use crate::cache::{BufferCache, CachedPage, PageCache};
use crate::storage::RecordData;

use super::Oid;
use super::directory::{RootRecordIter, RootRecords};

/// A restartable full scan over one table.
///
/// Every iterator walks the table's directory page afresh, so pages added
/// between two scans are picked up by the next one. Records are yielded
/// lazily in (page id, record id) order; deleted records are skipped.
pub struct FullScan<T> {
    cache: BufferCache,
    table_oid: Oid,
    parser: Rc<dyn Fn(&[u8]) -> T>,
}

impl<T> FullScan<T> {
    pub(super) fn new(cache: BufferCache, table_oid: Oid, parser: Rc<dyn Fn(&[u8]) -> T>) -> Self {
        Self {
            cache,
            table_oid,
            parser,
        }
    }

    pub fn table_oid(&self) -> Oid {
        self.table_oid
    }

    pub fn iter(&self) -> RecordIter<T> {
        RecordIter {
            pages: self.pages(),
            parser: Rc::clone(&self.parser),
            current: Vec::new().into_iter(),
        }
    }

    /// Iterates the table's pages without parsing their records.
    pub fn pages(&self) -> PageIter {
        PageIter {
            cache: self.cache.clone(),
            table_oid: self.table_oid,
            root_records: RootRecords::new(self.cache.clone(), self.table_oid, 1).iter(),
        }
    }
}

impl<T> IntoIterator for &FullScan<T> {
    type Item = T;
    type IntoIter = RecordIter<T>;

    fn into_iter(self) -> RecordIter<T> {
        self.iter()
    }
}

/// Yields the table's data pages in directory record order.
pub struct PageIter {
    cache: BufferCache,
    table_oid: Oid,
    root_records: RootRecordIter,
}

impl Iterator for PageIter {
    type Item = CachedPage;

    fn next(&mut self) -> Option<CachedPage> {
        loop {
            let (oid, page_id) = self.root_records.next()?;
            if oid == self.table_oid {
                return Some(self.cache.get(page_id));
            }
        }
    }
}

pub struct RecordIter<T> {
    pages: PageIter,
    parser: Rc<dyn Fn(&[u8]) -> T>,
    current: std::vec::IntoIter<T>,
}

impl<T> Iterator for RecordIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(record);
            }
            let page = self.pages.next()?;
            let records: Vec<T> = page
                .all_records()
                .into_iter()
                .filter_map(|(_, data)| match data {
                    RecordData::Live(bytes) => Some((self.parser)(&bytes)),
                    RecordData::Deleted => None,
                })
                .collect();
            self.current = records.into_iter();
        }
    }
}
