use super::error::{PageError, PageResult};
use super::{PAGE_SIZE, PageId, RecordId};

/// Byte offset where the directory entries begin (right after the record count).
const DIRECTORY_START: usize = 4;
/// Width of one directory entry: a signed 32-bit heap offset.
const ENTRY_SIZE: usize = 4;

/// Outcome of looking up a record slot.
///
/// A deleted record keeps its directory entry (with the sign flipped), so the
/// slot still exists and reports `Deleted` instead of disappearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    Live(Vec<u8>),
    Deleted,
}

impl RecordData {
    pub fn is_deleted(&self) -> bool {
        matches!(self, RecordData::Deleted)
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            RecordData::Live(bytes) => Some(bytes),
            RecordData::Deleted => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            RecordData::Live(bytes) => Some(bytes),
            RecordData::Deleted => None,
        }
    }
}

/// A slotted disk page: a 4-byte record count, a forward-growing directory of
/// signed heap offsets (one per record id, in id order) and a record heap
/// growing backward from the end of the page.
///
/// The sign of a directory entry encodes tombstone state: positive means a
/// live record at that offset, negative means the record is deleted but its
/// bytes are still where the magnitude points. Record ids are dense
/// `0..directory_size`; deleting never shrinks the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskPage {
    id: PageId,
    bytes: Vec<u8>,
}

impl DiskPage {
    /// Per-record bookkeeping overhead: one directory entry.
    pub const RECORD_HEADER_SIZE: usize = ENTRY_SIZE;

    pub fn new(id: PageId) -> Self {
        Self {
            id,
            bytes: vec![0u8; PAGE_SIZE],
        }
    }

    pub(crate) fn from_bytes(id: PageId, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), PAGE_SIZE);
        Self { id, bytes }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of record slots, live and deleted.
    pub fn directory_size(&self) -> usize {
        self.read_i32(0) as usize
    }

    /// Bytes not yet claimed by record data or directory entries.
    ///
    /// This is a reservation bound: an append consumes `len + RECORD_HEADER_SIZE`
    /// of it, so writers must validate against it before committing.
    pub fn free_space(&self) -> usize {
        self.last_record_offset()
            .saturating_sub(self.directory_size() * ENTRY_SIZE + DIRECTORY_START)
    }

    /// Inserts or updates a record.
    ///
    /// `None` (or `Some(directory_size)`) appends a new record; any smaller id
    /// updates in place, shifting the heap as needed when the size changes.
    pub fn put_record(
        &mut self,
        record_data: &[u8],
        record_id: Option<RecordId>,
    ) -> PageResult<RecordId> {
        let directory_size = self.directory_size();
        let record_id = record_id.unwrap_or(directory_size);
        if record_id > directory_size {
            return Err(PageError::OutOfRange {
                record_id,
                directory_size,
            });
        }

        if record_id == directory_size {
            let needed = record_data.len() + ENTRY_SIZE;
            let free = self.free_space();
            if needed > free {
                return Err(PageError::OutOfSpace { needed, free });
            }
            let offset = self.last_record_offset() - record_data.len();
            self.write_entry(record_id, offset as i32);
            self.bytes[offset..offset + record_data.len()].copy_from_slice(record_data);
            self.write_i32(0, (directory_size + 1) as i32);
            return Ok(record_id);
        }

        let (start, end) = self.record_region(record_id);
        let delta = record_data.len() as isize - (end - start) as isize;
        if delta > self.free_space() as isize {
            return Err(PageError::OutOfSpace {
                needed: record_data.len(),
                free: self.free_space() + (end - start),
            });
        }
        self.shift_records(record_id, delta);
        let (start, _) = self.record_region(record_id);
        self.bytes[start..start + record_data.len()].copy_from_slice(record_data);
        // Rewriting the entry positive revives a tombstoned slot.
        self.write_entry(record_id, start as i32);
        Ok(record_id)
    }

    pub fn get_record(&self, record_id: RecordId) -> PageResult<RecordData> {
        let directory_size = self.directory_size();
        if record_id >= directory_size {
            return Err(PageError::OutOfRange {
                record_id,
                directory_size,
            });
        }
        if self.read_entry(record_id) < 0 {
            return Ok(RecordData::Deleted);
        }
        let (start, end) = self.record_region(record_id);
        Ok(RecordData::Live(self.bytes[start..end].to_vec()))
    }

    /// Marks a record as deleted by negating its directory entry. Idempotent;
    /// a no-op for ids outside the directory.
    pub fn delete_record(&mut self, record_id: RecordId) {
        if record_id >= self.directory_size() {
            return;
        }
        let entry = self.read_entry(record_id);
        if entry > 0 {
            self.write_entry(record_id, -entry);
        }
    }

    /// Every directory slot in record-id order, tombstones included.
    pub fn all_records(&self) -> Vec<(RecordId, RecordData)> {
        (0..self.directory_size())
            .map(|record_id| {
                let data = if self.read_entry(record_id) < 0 {
                    RecordData::Deleted
                } else {
                    let (start, end) = self.record_region(record_id);
                    RecordData::Live(self.bytes[start..end].to_vec())
                };
                (record_id, data)
            })
            .collect()
    }

    /// Heap boundary: the lowest byte offset occupied by record data.
    fn last_record_offset(&self) -> usize {
        let directory_size = self.directory_size();
        if directory_size == 0 {
            PAGE_SIZE
        } else {
            self.read_entry(directory_size - 1).unsigned_abs() as usize
        }
    }

    /// `[start, end)` byte range of a record's heap region. The region of
    /// record `i` is bounded above by record `i - 1` (records pack backward).
    fn record_region(&self, record_id: RecordId) -> (usize, usize) {
        let start = self.read_entry(record_id).unsigned_abs() as usize;
        let end = if record_id == 0 {
            PAGE_SIZE
        } else {
            self.read_entry(record_id - 1).unsigned_abs() as usize
        };
        (start, end)
    }

    /// Shifts the heap block below `start_record_id` by `delta` bytes
    /// (toward the directory when growing, away when shrinking) and rewrites
    /// the affected directory entries, preserving tombstone signs. Freed
    /// bytes are zero-filled on shrink.
    fn shift_records(&mut self, start_record_id: RecordId, delta: isize) {
        if delta == 0 {
            return;
        }
        let start_offset = self.read_entry(start_record_id).unsigned_abs() as usize;
        let last_offset = self.last_record_offset();
        let new_last_offset = (last_offset as isize - delta) as usize;
        self.bytes
            .copy_within(last_offset..start_offset, new_last_offset);
        if delta < 0 {
            self.bytes[last_offset..last_offset + delta.unsigned_abs()].fill(0);
        }
        for record_id in start_record_id..self.directory_size() {
            let entry = self.read_entry(record_id);
            let moved = entry.abs() - delta as i32;
            self.write_entry(record_id, if entry < 0 { -moved } else { moved });
        }
    }

    fn read_entry(&self, record_id: RecordId) -> i32 {
        self.read_i32(DIRECTORY_START + record_id * ENTRY_SIZE)
    }

    fn write_entry(&mut self, record_id: RecordId, value: i32) {
        self.write_i32(DIRECTORY_START + record_id * ENTRY_SIZE, value);
    }

    fn read_i32(&self, offset: usize) -> i32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[offset..offset + 4]);
        i32::from_le_bytes(buf)
    }

    fn write_i32(&mut self, offset: usize, value: i32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}
