mod policy;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use tracing::trace;

use crate::storage::{DiskPage, PageId, PageResult, RecordData, RecordId, SharedStorage};

pub use policy::{ClockSweepPolicy, FifoPolicy, ReplacementPolicy};

/// Access statistics of a cache or sub-cache instance.
///
/// Counters are monotonic for the lifetime of the instance. Bulk loads do
/// not touch them: pre-fetching would only register misses and skew the
/// hit rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cache_hit: u64,
    pub cache_miss: u64,
}

/// Usage metadata of a cached page, consulted by replacement policies.
#[derive(Debug, Clone, Copy)]
pub struct CachedPageUsage {
    pub access_count: u64,
    pub last_access: Instant,
}

/// A page resident in the cache arena: the page itself plus pin count,
/// dirty flag and usage metadata.
pub struct Frame {
    page: DiskPage,
    pin_count: u32,
    dirty: bool,
    usage: CachedPageUsage,
}

impl Frame {
    fn new(page: DiskPage) -> Self {
        Self {
            page,
            pin_count: 0,
            dirty: false,
            usage: CachedPageUsage {
                access_count: 0,
                last_access: Instant::now(),
            },
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.id()
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn usage(&self) -> CachedPageUsage {
        self.usage
    }
}

pub type FrameRef = Rc<RefCell<Frame>>;

/// Handle to a cached page.
///
/// Record mutations go through the handle so the dirty flag is always set;
/// a handle obtained via [`PageCache::get_and_pin`] releases its pin when
/// dropped, which makes pin leaks impossible on any exit path.
pub struct CachedPage {
    frame: FrameRef,
    pinned: bool,
}

impl CachedPage {
    pub fn id(&self) -> PageId {
        self.frame.borrow().page.id()
    }

    pub fn put_record(
        &self,
        record_data: &[u8],
        record_id: Option<RecordId>,
    ) -> PageResult<RecordId> {
        let mut frame = self.frame.borrow_mut();
        frame.dirty = true;
        frame.page.put_record(record_data, record_id)
    }

    pub fn get_record(&self, record_id: RecordId) -> PageResult<RecordData> {
        self.frame.borrow().page.get_record(record_id)
    }

    pub fn delete_record(&self, record_id: RecordId) {
        let mut frame = self.frame.borrow_mut();
        frame.dirty = true;
        frame.page.delete_record(record_id);
    }

    pub fn all_records(&self) -> Vec<(RecordId, RecordData)> {
        self.frame.borrow().page.all_records()
    }

    pub fn free_space(&self) -> usize {
        self.frame.borrow().page.free_space()
    }

    pub fn directory_size(&self) -> usize {
        self.frame.borrow().page.directory_size()
    }

    pub fn is_dirty(&self) -> bool {
        self.frame.borrow().dirty
    }

    pub fn usage(&self) -> CachedPageUsage {
        self.frame.borrow().usage
    }

    pub fn pin_count(&self) -> u32 {
        self.frame.borrow().pin_count
    }
}

impl Drop for CachedPage {
    fn drop(&mut self) {
        if self.pinned {
            let mut frame = self.frame.borrow_mut();
            if frame.pin_count > 0 {
                frame.pin_count -= 1;
            }
        }
    }
}

/// A buffer cache over emulated block storage.
///
/// Implemented by [`BufferCache`] (which owns the frame arena) and
/// [`SubCache`] (a bounded membership view sharing its parent's arena).
pub trait PageCache {
    /// Bulk pre-fetch without pinning. Hit/miss statistics stay untouched;
    /// usage metadata is still updated.
    fn load(&self, start_page_id: PageId, page_count: usize);

    /// Fetch-or-create without pinning.
    fn get(&self, page_id: PageId) -> CachedPage;

    /// Fetch-or-create and pin. The pin is released when the returned
    /// handle is dropped.
    fn get_and_pin(&self, page_id: PageId) -> CachedPage;

    /// Creates a bounded sub-cache for short-lived bulk operations.
    ///
    /// Panics when called on a sub-cache: nesting is unsupported.
    fn create_sub_cache(&self, size: usize) -> SubCache;

    /// Writes every dirty page in scope and clears the dirty flags.
    /// Idempotent.
    fn flush(&self);

    fn stats(&self) -> CacheStats;

    /// Maximum number of resident pages; `None` means unbounded.
    fn capacity(&self) -> Option<usize>;
}

struct CacheInner {
    storage: SharedStorage,
    frames: Vec<FrameRef>,
    capacity: Option<usize>,
    policy: Box<dyn ReplacementPolicy>,
    stats: CacheStats,
}

impl CacheInner {
    fn find(&self, page_id: PageId) -> Option<(usize, FrameRef)> {
        self.frames
            .iter()
            .position(|f| f.borrow().page.id() == page_id)
            .map(|slot| (slot, Rc::clone(&self.frames[slot])))
    }

    /// Creates a frame for `page`, evicting a victim when the arena is at
    /// capacity. Eviction replaces the victim's slot in place, so slot
    /// order stays stable for FIFO-style policies.
    fn add_frame(&mut self, page: DiskPage) -> (usize, FrameRef) {
        let frame = Rc::new(RefCell::new(Frame::new(page)));
        if Some(self.frames.len()) == self.capacity {
            let slot = self.choose_victim();
            self.swap(slot, Rc::clone(&frame));
            (slot, frame)
        } else {
            self.frames.push(Rc::clone(&frame));
            (self.frames.len() - 1, frame)
        }
    }

    fn choose_victim(&mut self) -> usize {
        self.policy
            .victim(&self.frames)
            .unwrap_or_else(|| panic!("all pages are pinned, there is no victim for eviction"))
    }

    fn swap(&mut self, slot: usize, new_frame: FrameRef) {
        let victim = Rc::clone(&self.frames[slot]);
        trace!(page_id = victim.borrow().page.id(), "evicting page");
        self.write_frame(&victim);
        self.frames[slot] = new_frame;
    }

    fn write_frame(&self, frame: &FrameRef) {
        let mut frame = frame.borrow_mut();
        if frame.dirty {
            self.storage.borrow_mut().write(&frame.page);
            frame.dirty = false;
        }
    }

    fn record_request(&mut self, slot: usize, frame: &FrameRef, hit: Option<bool>) {
        match hit {
            Some(true) => self.stats.cache_hit += 1,
            Some(false) => self.stats.cache_miss += 1,
            None => {}
        }
        {
            let mut frame = frame.borrow_mut();
            frame.usage.access_count += 1;
            frame.usage.last_access = Instant::now();
        }
        self.policy.touched(slot, &self.frames);
    }

    fn flush(&mut self) {
        trace!(frames = self.frames.len(), "flushing cache");
        for frame in &self.frames {
            self.write_frame(frame);
        }
    }
}

/// The main cache: owns the frame arena, the storage handle and the
/// replacement policy. Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct BufferCache {
    inner: Rc<RefCell<CacheInner>>,
}

impl BufferCache {
    /// Creates a cache with the baseline FIFO-like policy.
    /// `capacity = None` means the cache grows without bound.
    pub fn new(storage: SharedStorage, capacity: Option<usize>) -> Self {
        Self::with_policy(storage, capacity, Box::new(FifoPolicy))
    }

    pub fn with_policy(
        storage: SharedStorage,
        capacity: Option<usize>,
        policy: Box<dyn ReplacementPolicy>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CacheInner {
                storage,
                frames: Vec::new(),
                capacity,
                policy,
                stats: CacheStats::default(),
            })),
        }
    }

    fn get_impl(&self, page_id: PageId, pin_increment: u32) -> CachedPage {
        let mut inner = self.inner.borrow_mut();
        let (slot, frame, hit) = match inner.find(page_id) {
            Some((slot, frame)) => (slot, frame, true),
            None => {
                let page = inner.storage.borrow_mut().read(page_id);
                let (slot, frame) = inner.add_frame(page);
                (slot, frame, false)
            }
        };
        inner.record_request(slot, &frame, Some(hit));
        frame.borrow_mut().pin_count += pin_increment;
        CachedPage {
            frame,
            pinned: pin_increment > 0,
        }
    }
}

impl PageCache for BufferCache {
    fn load(&self, start_page_id: PageId, page_count: usize) {
        let mut inner = self.inner.borrow_mut();
        let pages = read_run(&inner.storage, start_page_id, page_count);
        for page in pages {
            let (slot, frame) = match inner.find(page.id()) {
                Some(found) => found,
                None => inner.add_frame(page),
            };
            inner.record_request(slot, &frame, None);
        }
    }

    fn get(&self, page_id: PageId) -> CachedPage {
        self.get_impl(page_id, 0)
    }

    fn get_and_pin(&self, page_id: PageId) -> CachedPage {
        self.get_impl(page_id, 1)
    }

    fn create_sub_cache(&self, size: usize) -> SubCache {
        SubCache {
            inner: Rc::clone(&self.inner),
            members: RefCell::new(Vec::new()),
            stats: RefCell::new(CacheStats::default()),
            capacity: size,
        }
    }

    fn flush(&self) {
        self.inner.borrow_mut().flush();
    }

    fn stats(&self) -> CacheStats {
        self.inner.borrow().stats
    }

    fn capacity(&self) -> Option<usize> {
        self.inner.borrow().capacity
    }
}

fn read_run(storage: &SharedStorage, start_page_id: PageId, page_count: usize) -> Vec<DiskPage> {
    let mut pages = Vec::with_capacity(page_count);
    storage
        .borrow_mut()
        .bulk_read(Some(start_page_id), page_count, |page| pages.push(page));
    pages
}

/// A bounded view over a parent cache, intended for short-lived bulk
/// operations such as sort runs.
///
/// Members share the parent's frame arena: a page loaded through the
/// sub-cache is visible in the parent, and a parent-resident page requested
/// through the sub-cache is retroactively registered as a member. Eviction
/// and flush triggered here only ever touch member pages, so a bulk
/// operation cannot push out the main working set.
pub struct SubCache {
    inner: Rc<RefCell<CacheInner>>,
    members: RefCell<Vec<PageId>>,
    stats: RefCell<CacheStats>,
    capacity: usize,
}

impl SubCache {
    fn get_impl(&self, page_id: PageId, pin_increment: u32) -> CachedPage {
        let member_hit = self.members.borrow().contains(&page_id);
        {
            let mut stats = self.stats.borrow_mut();
            if member_hit {
                stats.cache_hit += 1;
            } else {
                stats.cache_miss += 1;
            }
        }
        let mut inner = self.inner.borrow_mut();
        let (slot, frame, hit) = match inner.find(page_id) {
            Some((slot, frame)) => (slot, frame, true),
            None => {
                let page = inner.storage.borrow_mut().read(page_id);
                let (slot, frame) = self.add_member_frame(&mut inner, page);
                (slot, frame, false)
            }
        };
        inner.record_request(slot, &frame, Some(hit));
        frame.borrow_mut().pin_count += pin_increment;
        drop(inner);
        if !member_hit {
            self.members.borrow_mut().push(page_id);
        }
        CachedPage {
            frame,
            pinned: pin_increment > 0,
        }
    }

    /// Inserts a frame on behalf of this sub-cache: once the membership set
    /// is full the eviction victim comes from the members, never from the
    /// rest of the parent's arena.
    fn add_member_frame(&self, inner: &mut CacheInner, page: DiskPage) -> (usize, FrameRef) {
        let frame = Rc::new(RefCell::new(Frame::new(page)));
        if self.members.borrow().len() == self.capacity {
            let victim_id = self.members.borrow_mut().remove(0);
            if let Some((slot, _)) = inner.find(victim_id) {
                inner.swap(slot, Rc::clone(&frame));
                return (slot, frame);
            }
            // The victim was already pushed out by the parent; fall through
            // to a plain insert.
        }
        inner.frames.push(Rc::clone(&frame));
        (inner.frames.len() - 1, frame)
    }
}

impl PageCache for SubCache {
    fn load(&self, start_page_id: PageId, page_count: usize) {
        let pages = {
            let inner = self.inner.borrow();
            read_run(&inner.storage, start_page_id, page_count)
        };
        for page in pages {
            let page_id = page.id();
            let mut inner = self.inner.borrow_mut();
            let (slot, frame) = match inner.find(page_id) {
                Some(found) => found,
                None => self.add_member_frame(&mut inner, page),
            };
            inner.record_request(slot, &frame, None);
            drop(inner);
            let mut members = self.members.borrow_mut();
            if !members.contains(&page_id) {
                members.push(page_id);
            }
        }
    }

    fn get(&self, page_id: PageId) -> CachedPage {
        self.get_impl(page_id, 0)
    }

    fn get_and_pin(&self, page_id: PageId) -> CachedPage {
        self.get_impl(page_id, 1)
    }

    fn create_sub_cache(&self, _size: usize) -> SubCache {
        panic!("sub-caches cannot be nested");
    }

    fn flush(&self) {
        let inner = self.inner.borrow();
        for page_id in self.members.borrow().iter() {
            if let Some((_, frame)) = inner.find(*page_id) {
                inner.write_frame(&frame);
            }
        }
    }

    fn stats(&self) -> CacheStats {
        *self.stats.borrow()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }
}
