use crate::cache::{BufferCache, PageCache};
use crate::record::{DataType, Record, Value};
use crate::storage::{PageId, RecordData};

use super::Oid;

const OID_PAGEID_SCHEMA: [DataType; 2] = [DataType::Int, DataType::Int];
const OID_NAME_SCHEMA: [DataType; 2] = [DataType::Int, DataType::Text];

pub(super) fn oid_pageid_bytes(oid: Oid, page_id: PageId) -> Vec<u8> {
    Record::new(vec![Value::Int(oid as i32), Value::Int(page_id as i32)])
        .map(|record| record.to_bytes())
        .unwrap_or_default()
}

pub(super) fn parse_oid_pageid(bytes: &[u8]) -> Option<(Oid, PageId)> {
    let record = Record::from_bytes(&OID_PAGEID_SCHEMA, bytes).ok()?;
    match (record.value(0), record.value(1)) {
        (Some(Value::Int(oid)), Some(Value::Int(page_id))) => {
            Some((Oid::try_from(*oid).ok()?, PageId::try_from(*page_id).ok()?))
        }
        _ => None,
    }
}

pub(super) fn oid_name_bytes(oid: Oid, name: &str) -> Vec<u8> {
    Record::new(vec![Value::Int(oid as i32), Value::Text(name.to_string())])
        .map(|record| record.to_bytes())
        .unwrap_or_default()
}

pub(super) fn parse_oid_name(bytes: &[u8]) -> Option<(Oid, String)> {
    let record = Record::from_bytes(&OID_NAME_SCHEMA, bytes).ok()?;
    match (record.value(0), record.value(1)) {
        (Some(Value::Int(oid)), Some(Value::Text(name))) => {
            Some((Oid::try_from(*oid).ok()?, name.clone()))
        }
        _ => None,
    }
}

/// Iterable over the (oid, page id) records of a run of root pages.
/// Every call to [`RootRecords::iter`] walks the run from the start.
pub struct RootRecords {
    cache: BufferCache,
    start_page_id: PageId,
    page_count: u32,
}

impl RootRecords {
    pub fn new(cache: BufferCache, start_page_id: PageId, page_count: u32) -> Self {
        Self {
            cache,
            start_page_id,
            page_count,
        }
    }

    /// Covers the maximal root page run starting at `start_page_id`. Root
    /// pages are pre-allocated by id rather than linked, so every walk is
    /// bounded by [`MAX_ROOT_PAGE_COUNT`](super::MAX_ROOT_PAGE_COUNT).
    pub fn full(cache: BufferCache, start_page_id: PageId) -> Self {
        Self::new(cache, start_page_id, super::MAX_ROOT_PAGE_COUNT)
    }

    pub fn iter(&self) -> RootRecordIter {
        RootRecordIter {
            cache: self.cache.clone(),
            next_page_id: self.start_page_id,
            end_page_id: self.start_page_id + self.page_count,
            current: Vec::new().into_iter(),
        }
    }
}

impl IntoIterator for &RootRecords {
    type Item = (Oid, PageId);
    type IntoIter = RootRecordIter;

    fn into_iter(self) -> RootRecordIter {
        self.iter()
    }
}

/// Walks root pages in id order and yields their live directory records in
/// record id order. Malformed records are skipped.
pub struct RootRecordIter {
    cache: BufferCache,
    next_page_id: PageId,
    end_page_id: PageId,
    current: std::vec::IntoIter<(Oid, PageId)>,
}

impl Iterator for RootRecordIter {
    type Item = (Oid, PageId);

    fn next(&mut self) -> Option<(Oid, PageId)> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(record);
            }
            if self.next_page_id >= self.end_page_id {
                return None;
            }
            let page = self.cache.get(self.next_page_id);
            self.next_page_id += 1;
            let records: Vec<(Oid, PageId)> = page
                .all_records()
                .into_iter()
                .filter_map(|(_, data)| match data {
                    RecordData::Live(bytes) => parse_oid_pageid(&bytes),
                    RecordData::Deleted => None,
                })
                .collect();
            self.current = records.into_iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskEmulator;

    #[test]
    fn test_oid_pageid_codec() {
        let bytes = oid_pageid_bytes(7, 4099);
        assert_eq!(bytes.len(), 8);
        assert_eq!(parse_oid_pageid(&bytes), Some((7, 4099)));
    }

    #[test]
    fn test_oid_name_codec() {
        let bytes = oid_name_bytes(3, "people");
        assert_eq!(parse_oid_name(&bytes), Some((3, "people".to_string())));
    }

    #[test]
    fn test_iterates_run_in_page_and_record_order() {
        let cache = BufferCache::new(DiskEmulator::new_shared(), None);
        {
            let first = cache.get(1);
            first.put_record(&oid_pageid_bytes(1, 4097), None).unwrap();
            first.put_record(&oid_pageid_bytes(1, 4098), None).unwrap();
            let second = cache.get(2);
            second.put_record(&oid_pageid_bytes(2, 4099), None).unwrap();
        }
        let records = RootRecords::new(cache, 1, 2);
        let collected: Vec<_> = records.iter().collect();
        assert_eq!(collected, vec![(1, 4097), (1, 4098), (2, 4099)]);
        // A second iterator starts over.
        assert_eq!(records.iter().count(), 3);
    }

    #[test]
    fn test_skips_deleted_records_and_empty_pages() {
        let cache = BufferCache::new(DiskEmulator::new_shared(), None);
        {
            let page = cache.get(1);
            let record_id = page.put_record(&oid_pageid_bytes(1, 4097), None).unwrap();
            page.put_record(&oid_pageid_bytes(1, 4098), None).unwrap();
            page.delete_record(record_id);
        }
        let records = RootRecords::full(cache, 1);
        assert_eq!(records.iter().collect::<Vec<_>>(), vec![(1, 4098)]);
    }
}
