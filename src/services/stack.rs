//! The command stack.
//!
//! A LIFO stack of raw command frames plus two parallel stacks of boundary
//! IDs tracking active try and silent blocks. A monotonic counter hands out
//! unique boundary IDs. The depth guard drops overflowing pushes silently and
//! latches a flag the engine turns into `#stack_overflow`.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::registry::Service;

/// Default maximum stack depth, overridable via `_max_stack_depth`.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 1000;

const ERROR_BOUNDARY_START: &str = "ERROR_BOUNDARY_START:";
const ERROR_BOUNDARY_END: &str = "ERROR_BOUNDARY_END:";
const SILENT_BOUNDARY_START: &str = "SILENT_BOUNDARY_START:";
const SILENT_BOUNDARY_END: &str = "SILENT_BOUNDARY_END:";

/// A synthetic boundary frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    ErrorStart(u64),
    ErrorEnd(u64),
    SilentStart(u64),
    SilentEnd(u64),
}

impl Boundary {
    /// Renders the boundary as its stack-frame string.
    pub fn frame(&self) -> String {
        match self {
            Self::ErrorStart(id) => format!("{}{}", ERROR_BOUNDARY_START, id),
            Self::ErrorEnd(id) => format!("{}{}", ERROR_BOUNDARY_END, id),
            Self::SilentStart(id) => format!("{}{}", SILENT_BOUNDARY_START, id),
            Self::SilentEnd(id) => format!("{}{}", SILENT_BOUNDARY_END, id),
        }
    }

    /// Parses a stack frame as a boundary marker.
    pub fn parse(frame: &str) -> Option<Self> {
        let parse_id = |rest: &str| rest.parse::<u64>().ok();
        if let Some(rest) = frame.strip_prefix(ERROR_BOUNDARY_START) {
            return parse_id(rest).map(Self::ErrorStart);
        }
        if let Some(rest) = frame.strip_prefix(ERROR_BOUNDARY_END) {
            return parse_id(rest).map(Self::ErrorEnd);
        }
        if let Some(rest) = frame.strip_prefix(SILENT_BOUNDARY_START) {
            return parse_id(rest).map(Self::SilentStart);
        }
        if let Some(rest) = frame.strip_prefix(SILENT_BOUNDARY_END) {
            return parse_id(rest).map(Self::SilentEnd);
        }
        None
    }
}

/// The stack service.
pub struct StackService {
    frames: Mutex<Vec<String>>,
    try_ids: Mutex<Vec<u64>>,
    silent_ids: Mutex<Vec<u64>>,
    next_id: AtomicU64,
    max_depth: AtomicUsize,
    overflowed: AtomicBool,
}

impl StackService {
    /// Creates an empty stack with the default depth guard.
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            try_ids: Mutex::new(Vec::new()),
            silent_ids: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            max_depth: AtomicUsize::new(DEFAULT_MAX_STACK_DEPTH),
            overflowed: AtomicBool::new(false),
        }
    }

    /// Pushes a frame. A push that would exceed the depth guard is dropped
    /// and latches the overflow flag; returns whether the push landed.
    pub fn push_command(&self, frame: impl Into<String>) -> bool {
        let mut frames = self.frames.lock();
        if frames.len() >= self.max_depth.load(Ordering::Relaxed) {
            self.overflowed.store(true, Ordering::Relaxed);
            return false;
        }
        frames.push(frame.into());
        true
    }

    /// Pops the top frame.
    pub fn pop_command(&self) -> Option<String> {
        self.frames.lock().pop()
    }

    /// Returns a copy of the stack, top frame last.
    pub fn peek_stack(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Returns the current stack size.
    pub fn stack_size(&self) -> usize {
        self.frames.lock().len()
    }

    /// Removes every pending frame. Used when aborting after a fatal error.
    pub fn clear(&self) {
        self.frames.lock().clear();
        self.try_ids.lock().clear();
        self.silent_ids.lock().clear();
    }

    /// Hands out the next unique boundary ID.
    pub fn next_boundary_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // Try boundaries

    pub fn push_error_boundary(&self, id: u64) {
        self.try_ids.lock().push(id);
    }

    /// Pops the current try boundary if it matches `id`.
    pub fn pop_error_boundary(&self, id: u64) {
        let mut ids = self.try_ids.lock();
        if ids.last() == Some(&id) {
            ids.pop();
        }
    }

    pub fn is_in_try_block(&self) -> bool {
        !self.try_ids.lock().is_empty()
    }

    pub fn current_try_id(&self) -> Option<u64> {
        self.try_ids.lock().last().copied()
    }

    pub fn current_try_depth(&self) -> usize {
        self.try_ids.lock().len()
    }

    // Silent boundaries

    pub fn push_silent_boundary(&self, id: u64) {
        self.silent_ids.lock().push(id);
    }

    pub fn pop_silent_boundary(&self, id: u64) {
        let mut ids = self.silent_ids.lock();
        if ids.last() == Some(&id) {
            ids.pop();
        }
    }

    pub fn is_in_silent_block(&self) -> bool {
        !self.silent_ids.lock().is_empty()
    }

    pub fn current_silent_id(&self) -> Option<u64> {
        self.silent_ids.lock().last().copied()
    }

    pub fn current_silent_depth(&self) -> usize {
        self.silent_ids.lock().len()
    }

    // Depth guard

    /// Reconfigures the depth guard.
    pub fn set_max_depth(&self, depth: usize) {
        self.max_depth.store(depth.max(1), Ordering::Relaxed);
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth.load(Ordering::Relaxed)
    }

    /// Returns and clears the overflow latch.
    pub fn take_overflow(&self) -> bool {
        self.overflowed.swap(false, Ordering::Relaxed)
    }
}

impl Default for StackService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for StackService {
    fn name(&self) -> &str {
        "stack"
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_is_lifo() {
        let stack = StackService::new();
        stack.push_command("first");
        stack.push_command("second");

        assert_eq!(stack.pop_command().as_deref(), Some("second"));
        assert_eq!(stack.pop_command().as_deref(), Some("first"));
        assert_eq!(stack.pop_command(), None);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let stack = StackService::new();
        stack.push_command("bottom");
        stack.push_command("top");

        assert_eq!(stack.peek_stack(), vec!["bottom", "top"]);
        assert_eq!(stack.stack_size(), 2);
    }

    #[test]
    fn test_stack_size_returns_to_prior_value() {
        let stack = StackService::new();
        let before = stack.stack_size();
        stack.push_command("frame");
        assert_eq!(stack.stack_size(), before + 1);
        stack.pop_command();
        assert_eq!(stack.stack_size(), before);
    }

    #[test]
    fn test_boundary_ids_are_unique_and_monotonic() {
        let stack = StackService::new();
        let a = stack.next_boundary_id();
        let b = stack.next_boundary_id();
        assert!(b > a);
    }

    #[test]
    fn test_try_boundaries_nest_symmetrically() {
        let stack = StackService::new();
        assert!(!stack.is_in_try_block());

        stack.push_error_boundary(1);
        stack.push_error_boundary(2);
        assert_eq!(stack.current_try_depth(), 2);
        assert_eq!(stack.current_try_id(), Some(2));

        stack.pop_error_boundary(2);
        assert_eq!(stack.current_try_id(), Some(1));
        stack.pop_error_boundary(1);
        assert!(!stack.is_in_try_block());
    }

    #[test]
    fn test_pop_boundary_ignores_mismatched_id() {
        let stack = StackService::new();
        stack.push_error_boundary(7);
        stack.pop_error_boundary(99);
        assert_eq!(stack.current_try_id(), Some(7));
    }

    #[test]
    fn test_silent_boundaries_track_depth() {
        let stack = StackService::new();
        stack.push_silent_boundary(3);
        assert!(stack.is_in_silent_block());
        assert_eq!(stack.current_silent_depth(), 1);
        stack.pop_silent_boundary(3);
        assert!(!stack.is_in_silent_block());
    }

    #[test]
    fn test_depth_guard_drops_push_and_latches_overflow() {
        let stack = StackService::new();
        stack.set_max_depth(2);

        assert!(stack.push_command("a"));
        assert!(stack.push_command("b"));
        assert!(!stack.push_command("c"));

        assert_eq!(stack.stack_size(), 2);
        assert!(stack.take_overflow());
        // The latch clears on read.
        assert!(!stack.take_overflow());
    }

    #[test]
    fn test_boundary_frame_roundtrip() {
        let cases = [
            Boundary::ErrorStart(12),
            Boundary::ErrorEnd(12),
            Boundary::SilentStart(5),
            Boundary::SilentEnd(5),
        ];
        for boundary in cases {
            assert_eq!(Boundary::parse(&boundary.frame()), Some(boundary));
        }
    }

    #[test]
    fn test_boundary_parse_rejects_ordinary_frames() {
        assert_eq!(Boundary::parse("\\set[x=1]"), None);
        assert_eq!(Boundary::parse("ERROR_BOUNDARY_START:abc"), None);
        assert_eq!(Boundary::parse(""), None);
    }
}
