//! Segmented LIFO scratch memory.
//!
//! A [`Scratch`] is a list of segments that never move once allocated. Space
//! is handed out in [`Frame`]s: a frame is a run of same-typed elements at
//! the top of the stack, and frames nest strictly (a frame opened while
//! another is being filled is closed first). When a frame outgrows its
//! segment, its elements are moved bitwise into the next empty segment that
//! is large enough, allocating one (double the size, 8 KiB floor) if needed.
//! Elements already handed out by *enclosing* frames never move.

use alloc::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use alloc::vec::Vec;
use core::ptr::NonNull;

use jsonplan_core::{PtrMut, PtrUninit, Shape};

/// Smallest segment the scratch allocates.
pub const MIN_SEGMENT: usize = 8 * 1024;

/// Alignment of segment base addresses; larger alignments are handled by
/// padding inside the segment.
const SEGMENT_ALIGN: usize = 16;

struct Segment {
    base: NonNull<u8>,
    cap: usize,
    top: usize,
    /// Segments adopted from a batch are not ours to free.
    owned: bool,
}

impl Segment {
    fn alloc(cap: usize) -> Self {
        let Ok(layout) = Layout::from_size_align(cap, SEGMENT_ALIGN) else {
            panic!("scratch segment size overflow");
        };
        // SAFETY: cap >= MIN_SEGMENT > 0
        let p = unsafe { alloc(layout) };
        let base = NonNull::new(p).unwrap_or_else(|| handle_alloc_error(layout));
        Self {
            base,
            cap,
            top: 0,
            owned: true,
        }
    }

    /// Offset of the first `align`-aligned byte at or after `from`.
    #[inline]
    fn align_offset(&self, from: usize, align: usize) -> usize {
        let addr = self.base.as_ptr() as usize + from;
        let aligned = (addr + align - 1) & !(align - 1);
        aligned - self.base.as_ptr() as usize
    }
}

/// A run of elements of one shape at the top of a [`Scratch`].
#[must_use = "frames must be finished or aborted"]
pub struct Frame {
    shape: &'static Shape,
    seg: usize,
    start: usize,
    len: usize,
    /// Where the stack top was when the frame opened.
    restore_seg: usize,
    restore_top: usize,
}

impl Frame {
    /// Number of elements pushed so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing was pushed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shape of the elements.
    #[inline]
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }
}

/// Segmented stack of frames.
#[derive(Default)]
pub struct Scratch {
    segments: Vec<Segment>,
    cur: usize,
}

// SAFETY: a Scratch exclusively owns its segments (adopted ones are leaked
// batch blocks nobody else references).
unsafe impl Send for Scratch {}

impl Scratch {
    /// An empty scratch; segments are allocated on first use.
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
            cur: 0,
        }
    }

    /// Total bytes of segment memory held.
    pub fn capacity(&self) -> usize {
        self.segments.iter().map(|s| s.cap).sum()
    }

    /// Bytes free in the segment the next frame would open in.
    pub fn available(&self) -> usize {
        self.segments
            .get(self.cur)
            .map_or(0, |s| s.cap.saturating_sub(s.top))
    }

    /// Returns true when no frame is open.
    pub fn is_idle(&self) -> bool {
        self.cur == 0 && self.segments.iter().all(|s| s.top == 0)
    }

    /// Puts an externally owned block of `cap` bytes in front of the
    /// existing segments. Only valid while no frame is open.
    pub fn adopt(&mut self, block: NonNull<u8>, cap: usize) {
        debug_assert!(self.is_idle());
        self.segments.insert(
            0,
            Segment {
                base: block,
                cap,
                top: 0,
                owned: false,
            },
        );
        self.cur = 0;
    }

    /// Moves the adopted segments, emptied, into a new scratch. Owned
    /// segments stay behind and are freed with `self`.
    pub fn take_adopted(&mut self) -> Scratch {
        let mut adopted = Scratch::new();
        self.segments.retain(|seg| {
            if seg.owned {
                return true;
            }
            adopted.segments.push(Segment {
                base: seg.base,
                cap: seg.cap,
                top: 0,
                owned: false,
            });
            false
        });
        self.cur = 0;
        adopted
    }

    /// Opens a frame for elements of `shape`.
    pub fn begin(&mut self, shape: &'static Shape) -> Frame {
        if self.segments.is_empty() {
            self.segments.push(Segment::alloc(MIN_SEGMENT));
            self.cur = 0;
        }
        let seg = &self.segments[self.cur];
        Frame {
            shape,
            seg: self.cur,
            start: seg.align_offset(seg.top, shape.layout.align()),
            len: 0,
            restore_seg: self.cur,
            restore_top: seg.top,
        }
    }

    /// Reserves the next element of `frame` and default-initialises it.
    pub fn push_default(&mut self, frame: &mut Frame) -> PtrMut {
        let slot = self.push_uninit(frame);
        // SAFETY: slot is fresh, aligned storage for one element of the shape
        unsafe { frame.shape.call_default_in_place(slot) }
    }

    /// Reserves the next element of `frame` without initialising it. The
    /// caller must initialise it before the frame is finished or aborted.
    pub fn push_uninit(&mut self, frame: &mut Frame) -> PtrUninit {
        let size = frame.shape.layout.size();
        let end = frame.start + (frame.len + 1) * size;
        if end > self.segments[frame.seg].cap {
            self.relocate(frame);
        }
        let seg = &mut self.segments[frame.seg];
        let offset = frame.start + frame.len * size;
        seg.top = offset + size;
        frame.len += 1;
        // SAFETY: offset + size <= cap
        PtrUninit::new(unsafe { seg.base.as_ptr().add(offset) })
    }

    /// Pointer to the first element (dangling-but-aligned when empty).
    pub fn elements(&self, frame: &Frame) -> PtrMut {
        if frame.len == 0 {
            return PtrMut::new(core::ptr::without_provenance_mut::<u8>(
                frame.shape.layout.align(),
            ));
        }
        let seg = &self.segments[frame.seg];
        // SAFETY: the first element lies within the segment
        PtrMut::new(unsafe { seg.base.as_ptr().add(frame.start) })
    }

    /// Pointer to element `i` of the frame.
    pub fn element(&self, frame: &Frame, i: usize) -> PtrMut {
        debug_assert!(i < frame.len);
        let seg = &self.segments[frame.seg];
        // SAFETY: i < len, so the element lies within the segment
        PtrMut::new(unsafe {
            seg.base
                .as_ptr()
                .add(frame.start + i * frame.shape.layout.size())
        })
    }

    /// Closes `frame`; its elements must have been moved out already.
    pub fn finish(&mut self, frame: Frame) {
        let seg = &mut self.segments[frame.seg];
        seg.top = if frame.seg == frame.restore_seg {
            frame.restore_top
        } else {
            0
        };
        self.cur = frame.restore_seg;
    }

    /// Drops the frame's elements and closes it.
    pub fn abort(&mut self, frame: Frame) {
        if frame.shape.needs_drop() {
            for i in 0..frame.len {
                let elem = self.element(&frame, i);
                // SAFETY: every pushed element was initialised and not moved out
                unsafe { frame.shape.call_drop_in_place(elem) };
            }
        }
        self.finish(frame);
    }

    /// Moves the frame into a segment with room for one more element.
    #[cold]
    fn relocate(&mut self, frame: &mut Frame) {
        let layout = frame.shape.layout;
        let needed = (frame.len + 1) * layout.size() + layout.align();
        let old_cap = self.segments[frame.seg].cap;

        let target = (frame.seg + 1..self.segments.len())
            .find(|&j| self.segments[j].cap >= needed)
            .unwrap_or_else(|| {
                let cap = needed.max(old_cap.saturating_mul(2)).max(MIN_SEGMENT);
                trace!(cap, "scratch segment allocated");
                let at = frame.seg + 1;
                self.segments.insert(at, Segment::alloc(cap));
                at
            });

        let to = &self.segments[target];
        let start = to.align_offset(0, layout.align());
        let bytes = frame.len * layout.size();
        let from = self.segments[frame.seg].base.as_ptr();
        // SAFETY: both ranges are in bounds and in different segments
        unsafe {
            core::ptr::copy_nonoverlapping(
                from.add(frame.start),
                to.base.as_ptr().add(start),
                bytes,
            );
        }

        let old = &mut self.segments[frame.seg];
        old.top = if frame.seg == frame.restore_seg {
            frame.restore_top
        } else {
            0
        };
        frame.seg = target;
        frame.start = start;
        self.segments[target].top = start + bytes;
        self.cur = target;
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for seg in &self.segments {
            if seg.owned {
                // SAFETY: owned segments were allocated by Segment::alloc with this layout
                unsafe {
                    dealloc(
                        seg.base.as_ptr(),
                        Layout::from_size_align_unchecked(seg.cap, SEGMENT_ALIGN),
                    )
                };
            }
        }
    }
}
