//! Compacting clause allocator.
//!
//! Long clauses are stored in a small set of word-aligned segments. Each clause occupies a
//! contiguous word range: a fixed size header followed by its literals. A [`ClauseRef`] packs the
//! segment index and the word offset within that segment into a single 32 bit value.
//!
//! Clauses can be freed at any time; this only marks the header and adjusts the live word count.
//! The storage itself is reclaimed by [`consolidate`](ClauseArena::consolidate), which copies all
//! live clauses into freshly sized segments and leaves a forwarding record in every moved slot.
//! The caller supplied rewriter uses these records to rewrite every outstanding `ClauseRef` (watch
//! lists and implication reasons) before the old segments are dropped. This split keeps frees
//! cheap inside hot loops while amortizing reclamation over consolidations.
//!
//! **Safety**: Using the safe methods is always memory safe, even if invariants of the clause
//! storage are violated. An example invariant is using only ClauseRefs produced by the same
//! arena. Some places in this codebase use the unsafe methods and expect users of the safe
//! methods to not violate these invariants. It is important that this does not leak through the
//! public API, i.e. crate external code using safe methods must be unable to violate invariants
//! expected for internal unsafe code.
use std::mem::transmute;
use std::slice;

use halite_formula::lit::{Lit, LitIdx};

use crate::errors::SolverError;

use super::{Clause, ClauseHeader, HEADER_LEN};

/// Number of bits of a [`ClauseRef`] used for the segment index.
const SEGMENT_BITS: u32 = 8;

/// Maximum number of segments the `ClauseRef` encoding supports.
const MAX_SEGMENTS: usize = 1 << SEGMENT_BITS;

/// Maximum size of a single segment in words.
const MAX_SEGMENT_WORDS: usize = 1 << (32 - SEGMENT_BITS);

/// Compact reference to a clause stored in a [`ClauseArena`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct ClauseRef {
    code: u32,
}

impl ClauseRef {
    fn new(segment: usize, offset: usize) -> ClauseRef {
        debug_assert!(segment < MAX_SEGMENTS);
        debug_assert!(offset < MAX_SEGMENT_WORDS);
        ClauseRef {
            code: (segment as u32) | ((offset as u32) << SEGMENT_BITS),
        }
    }

    pub(super) fn from_code(code: u32) -> ClauseRef {
        ClauseRef { code }
    }

    pub(super) fn code(self) -> u32 {
        self.code
    }

    fn segment(self) -> usize {
        (self.code & ((1 << SEGMENT_BITS) - 1)) as usize
    }

    fn offset(self) -> usize {
        (self.code >> SEGMENT_BITS) as usize
    }
}

/// A single backing segment.
///
/// The capacity is tracked explicitly, the backing `Vec` is only grown up to it.
struct Segment {
    data: Vec<LitIdx>,
    cap: usize,
}

impl Segment {
    fn with_capacity(cap: usize) -> Segment {
        Segment {
            data: Vec::with_capacity(cap),
            cap,
        }
    }

    fn room(&self) -> usize {
        self.cap - self.data.len()
    }
}

/// Compacting allocator for long clauses.
pub struct ClauseArena {
    segments: Vec<Segment>,
    /// Words occupied by non-freed clauses.
    live_words: usize,
    /// Words appended to segments, including freed clauses.
    used_words: usize,
    min_segment_words: usize,
    grow_mult: usize,
    high_utilization: f64,
    slack: f64,
}

impl Default for ClauseArena {
    fn default() -> ClauseArena {
        let config = crate::config::SolverConfig::default();
        ClauseArena {
            segments: vec![],
            live_words: 0,
            used_words: 0,
            min_segment_words: config.arena_min_segment_words,
            grow_mult: config.arena_grow_mult,
            high_utilization: config.arena_high_utilization,
            slack: config.arena_slack,
        }
    }
}

impl ClauseArena {
    /// Create an empty clause arena.
    pub fn new() -> ClauseArena {
        ClauseArena::default()
    }

    /// Update the allocation tuning parameters.
    pub fn configure(
        &mut self,
        min_segment_words: usize,
        grow_mult: usize,
        high_utilization: f64,
        slack: f64,
    ) {
        assert!(grow_mult >= 1);
        assert!(min_segment_words > HEADER_LEN);
        assert!(high_utilization > 0.0 && high_utilization <= 1.0);
        assert!(slack >= 1.0);
        self.min_segment_words = min_segment_words.min(MAX_SEGMENT_WORDS);
        self.grow_mult = grow_mult;
        self.high_utilization = high_utilization;
        self.slack = slack;
    }

    /// Allocate storage for and add a new clause.
    ///
    /// Clauses have a minimal size of 3, as binary, ternary and unit clauses are handled
    /// separately. This is enforced on the arena level to safely avoid extra bound checks when
    /// accessing the initial literals of a clause.
    ///
    /// The size of the header will be set to the size of the given slice. The returned
    /// [`ClauseRef`] stays valid until the clause is freed or the next consolidation rewrites it.
    pub fn alloc(&mut self, mut header: ClauseHeader, lits: &[Lit]) -> Result<ClauseRef, SolverError> {
        assert!(
            lits.len() >= 3,
            "ClauseArena can only store ternary and larger clauses"
        );

        let words = HEADER_LEN + lits.len();
        header.set_len(lits.len());

        let segment_index = match self.segment_with_room(words) {
            Some(index) => index,
            None => self.add_segment(words)?,
        };

        let segment = &mut self.segments[segment_index];
        let offset = segment.data.len();

        segment.data.extend_from_slice(&header.data);

        let lit_idx_slice = unsafe {
            // This is safe as Lit and LitIdx have the same representation
            slice::from_raw_parts(lits.as_ptr() as *const LitIdx, lits.len())
        };
        segment.data.extend_from_slice(lit_idx_slice);

        self.used_words += words;
        self.live_words += words;

        Ok(ClauseRef::new(segment_index, offset))
    }

    fn segment_with_room(&self, words: usize) -> Option<usize> {
        self.segments
            .iter()
            .position(|segment| segment.room() >= words)
    }

    fn add_segment(&mut self, words: usize) -> Result<usize, SolverError> {
        if words > MAX_SEGMENT_WORDS || self.segments.len() == MAX_SEGMENTS {
            return Err(SolverError::ArenaExhausted);
        }

        let grown = self
            .segments
            .last()
            .map(|segment| segment.cap.saturating_mul(self.grow_mult))
            .unwrap_or(0);

        let cap = grown
            .max(self.min_segment_words)
            .min(MAX_SEGMENT_WORDS)
            .max(words);

        self.segments.push(Segment::with_capacity(cap));
        Ok(self.segments.len() - 1)
    }

    /// Mark a clause as freed.
    ///
    /// The slot is reclaimed by the next consolidation; until then the freed mark is sticky.
    pub fn free(&mut self, cref: ClauseRef) {
        let words = HEADER_LEN + self.header(cref).len();
        let header = self.header_mut(cref);

        debug_assert!(!header.freed(), "free for already freed clause");
        header.set_freed(true);

        self.live_words -= words;
    }

    /// Access the header of a clause.
    pub fn header(&self, cref: ClauseRef) -> &ClauseHeader {
        let segment = &self.segments[cref.segment()];
        assert!(
            cref.offset() + HEADER_LEN <= segment.data.len(),
            "ClauseRef out of bounds"
        );
        unsafe { self.header_unchecked(cref) }
    }

    /// Mutate the header of a clause.
    pub fn header_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        let segment = &self.segments[cref.segment()];
        assert!(
            cref.offset() + HEADER_LEN <= segment.data.len(),
            "ClauseRef out of bounds"
        );
        unsafe { self.header_unchecked_mut(cref) }
    }

    pub(crate) unsafe fn header_unchecked(&self, cref: ClauseRef) -> &ClauseHeader {
        let segment = self.segments.get_unchecked(cref.segment());
        let header_pointer = segment.data.as_ptr().add(cref.offset()) as *const ClauseHeader;
        &*header_pointer
    }

    pub(crate) unsafe fn header_unchecked_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        let segment = self.segments.get_unchecked_mut(cref.segment());
        let header_pointer = segment.data.as_mut_ptr().add(cref.offset()) as *mut ClauseHeader;
        &mut *header_pointer
    }

    /// Access a clause.
    pub fn clause(&self, cref: ClauseRef) -> &Clause {
        let len = self.header(cref).len();
        let segment = &self.segments[cref.segment()];
        assert!(
            cref.offset() + HEADER_LEN + len <= segment.data.len(),
            "ClauseRef out of bounds"
        );
        unsafe { self.clause_with_len_unchecked(cref, len) }
    }

    /// Mutate a clause.
    pub fn clause_mut(&mut self, cref: ClauseRef) -> &mut Clause {
        let len = self.header(cref).len();
        let segment = &self.segments[cref.segment()];
        assert!(
            cref.offset() + HEADER_LEN + len <= segment.data.len(),
            "ClauseRef out of bounds"
        );
        unsafe { self.clause_with_len_unchecked_mut(cref, len) }
    }

    unsafe fn clause_with_len_unchecked(&self, cref: ClauseRef, len: usize) -> &Clause {
        let segment = self.segments.get_unchecked(cref.segment());
        transmute::<&[LitIdx], &Clause>(slice::from_raw_parts(
            segment.data.as_ptr().add(cref.offset()),
            len + HEADER_LEN,
        ))
    }

    unsafe fn clause_with_len_unchecked_mut(&mut self, cref: ClauseRef, len: usize) -> &mut Clause {
        let segment = self.segments.get_unchecked_mut(cref.segment());
        transmute::<&mut [LitIdx], &mut Clause>(slice::from_raw_parts_mut(
            segment.data.as_mut_ptr().add(cref.offset()),
            len + HEADER_LEN,
        ))
    }

    /// Panics when the first `len` literals of the clause are out of bounds.
    pub(crate) fn check_bounds(&self, cref: ClauseRef, len: usize) {
        let segment = &self.segments[cref.segment()];
        assert!(
            cref.offset() + HEADER_LEN + len <= segment.data.len(),
            "ClauseRef out of bounds"
        );
    }

    /// Raw pointer to the literals of a clause, for the propagation inner loop.
    pub(crate) unsafe fn lits_ptr_mut_unchecked(&mut self, cref: ClauseRef) -> *mut Lit {
        let segment = self.segments.get_unchecked_mut(cref.segment());
        segment.data.as_mut_ptr().add(cref.offset() + HEADER_LEN) as *mut Lit
    }

    /// Words occupied by non-freed clauses.
    pub fn live_words(&self) -> usize {
        self.live_words
    }

    /// Words appended to segments, including freed clauses.
    pub fn used_words(&self) -> usize {
        self.used_words
    }

    /// Fraction of the appended words that belong to non-freed clauses.
    pub fn live_ratio(&self) -> f64 {
        if self.used_words == 0 {
            1.0
        } else {
            self.live_words as f64 / self.used_words as f64
        }
    }

    /// Whether a consolidation would reclaim a worthwhile amount of storage.
    ///
    /// Also true under segment count pressure, as running out of encodable segments is fatal for
    /// allocation.
    pub fn should_consolidate(&self) -> bool {
        (self.used_words > 0 && self.live_ratio() < self.high_utilization)
            || self.segments.len() >= MAX_SEGMENTS - 1
    }

    /// Iterate over all live clauses in storage order.
    pub fn refs(&self) -> ClauseRefs {
        ClauseRefs {
            arena: self,
            segment: 0,
            offset: 0,
        }
    }

    /// Compact all live clauses into freshly sized segments.
    ///
    /// Every moved clause leaves a forwarding record in its old slot. The `rewriter` is called
    /// with a [`ClauseRefMap`] reading those records and must rewrite every outstanding
    /// [`ClauseRef`] before it returns; afterwards the old segments are dropped.
    pub fn consolidate<R>(&mut self, rewriter: R)
    where
        R: FnOnce(&ClauseRefMap),
    {
        let target_cap = ((self.live_words as f64 * self.slack) as usize + self.min_segment_words)
            .min(MAX_SEGMENT_WORDS);

        let mut new_segments = vec![Segment::with_capacity(target_cap)];

        for source_index in 0..self.segments.len() {
            let mut offset = 0;
            while offset < self.segments[source_index].data.len() {
                let header =
                    ClauseHeader::from_words(&self.segments[source_index].data[offset..offset + HEADER_LEN]);
                let words = HEADER_LEN + header.len();

                if !header.freed() {
                    if new_segments.last().unwrap().room() < words {
                        assert!(
                            new_segments.len() < MAX_SEGMENTS,
                            "consolidation exceeded the segment limit"
                        );
                        new_segments.push(Segment::with_capacity(target_cap.max(words)));
                    }

                    let dest_index = new_segments.len() - 1;
                    let dest = &mut new_segments[dest_index];
                    let new_ref = ClauseRef::new(dest_index, dest.data.len());

                    let source = &self.segments[source_index].data[offset..offset + words];
                    dest.data.extend_from_slice(source);

                    let slot = &mut self.segments[source_index].data[offset..offset + HEADER_LEN];
                    let mut forwarding = ClauseHeader::from_words(slot);
                    forwarding.set_moved(true);
                    forwarding.data[super::ACTIVITY_WORD] = new_ref.code();
                    slot.copy_from_slice(&forwarding.data);
                }

                offset += words;
            }
        }

        {
            let map = ClauseRefMap { arena: self };
            rewriter(&map);
        }

        self.used_words = new_segments.iter().map(|segment| segment.data.len()).sum();
        debug_assert_eq!(self.used_words, self.live_words);
        self.segments = new_segments;
    }
}

impl ClauseHeader {
    fn from_words(words: &[LitIdx]) -> ClauseHeader {
        let mut data = [0; HEADER_LEN];
        data.copy_from_slice(&words[..HEADER_LEN]);
        ClauseHeader { data }
    }
}

/// Iterator over the live clauses of an arena.
pub struct ClauseRefs<'a> {
    arena: &'a ClauseArena,
    segment: usize,
    offset: usize,
}

impl<'a> Iterator for ClauseRefs<'a> {
    type Item = ClauseRef;

    fn next(&mut self) -> Option<ClauseRef> {
        loop {
            let segment = self.arena.segments.get(self.segment)?;
            if self.offset >= segment.data.len() {
                self.segment += 1;
                self.offset = 0;
                continue;
            }

            let cref = ClauseRef::new(self.segment, self.offset);
            let header = self.arena.header(cref);
            self.offset += HEADER_LEN + header.len();

            if !header.freed() {
                return Some(cref);
            }
        }
    }
}

/// Forwarding map passed to the consolidation rewriter.
///
/// Reads the forwarding records written into the old segments.
pub struct ClauseRefMap<'a> {
    arena: &'a ClauseArena,
}

impl<'a> ClauseRefMap<'a> {
    /// The new location of a clause that was live at the start of the consolidation.
    pub fn forward(&self, old: ClauseRef) -> ClauseRef {
        let header = self.arena.header(old);
        debug_assert!(header.moved(), "forward called for a freed clause");
        ClauseRef::from_code(header.data[super::ACTIVITY_WORD])
    }

    /// The new location of a clause, or `None` when the clause was freed before consolidation.
    pub fn try_forward(&self, old: ClauseRef) -> Option<ClauseRef> {
        let header = self.arena.header(old);
        if header.moved() {
            Some(ClauseRef::from_code(header.data[super::ACTIVITY_WORD]))
        } else {
            None
        }
    }
}
