use super::FrameRef;

/// Page-replacement strategy injected into a [`super::BufferCache`].
///
/// The cache consults `victim` only when it must evict (a new frame is being
/// created while the arena is at capacity) and notifies `touched` on every
/// page request or bulk load. Implementations must never pick a pinned frame.
pub trait ReplacementPolicy {
    /// Chooses the arena slot to evict, or `None` when every resident frame
    /// is pinned.
    fn victim(&mut self, frames: &[FrameRef]) -> Option<usize>;

    /// Called after the frame in `slot` was requested or loaded.
    fn touched(&mut self, slot: usize, frames: &[FrameRef]);
}

/// Baseline policy: evict the first pin-count-zero frame in arena slot
/// order. Slot order is stable except where an eviction replaced a slot in
/// place, so this behaves FIFO-like until the first eviction.
#[derive(Debug, Default)]
pub struct FifoPolicy;

impl ReplacementPolicy for FifoPolicy {
    fn victim(&mut self, frames: &[FrameRef]) -> Option<usize> {
        frames.iter().position(|f| f.borrow().pin_count() == 0)
    }

    fn touched(&mut self, _slot: usize, _frames: &[FrameRef]) {}
}

/// Second-chance policy: a clock hand sweeps the arena, clearing per-slot
/// reference bits; a frame is evicted only when its bit was already clear.
/// Recently touched pages therefore survive one extra sweep.
#[derive(Debug, Default)]
pub struct ClockSweepPolicy {
    hand: usize,
    referenced: Vec<bool>,
}

impl ClockSweepPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplacementPolicy for ClockSweepPolicy {
    fn victim(&mut self, frames: &[FrameRef]) -> Option<usize> {
        if frames.is_empty() {
            return None;
        }
        self.referenced.resize(frames.len(), false);
        // Two full sweeps: the first clears reference bits, the second takes
        // the first unpinned frame that stayed clear. If nothing qualifies,
        // everything is pinned.
        for _ in 0..frames.len() * 2 {
            let slot = self.hand;
            self.hand = (self.hand + 1) % frames.len();
            if frames[slot].borrow().pin_count() > 0 {
                continue;
            }
            if self.referenced[slot] {
                self.referenced[slot] = false;
            } else {
                return Some(slot);
            }
        }
        None
    }

    fn touched(&mut self, slot: usize, frames: &[FrameRef]) {
        self.referenced.resize(frames.len().max(slot + 1), false);
        self.referenced[slot] = true;
    }
}
