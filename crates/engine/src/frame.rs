//! Frames and their materialized contents
//!
//! A `Frame` is created empty when the index is built and knows only its
//! declared call count. Its contents are materialized at most once into a
//! `OnceCell`; concurrent callers block on the first materialization and
//! then share the same `Arc<FrameContents>`.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracedex_core::CallNo;

use crate::call::{Call, CallId, Parent};

/// Calls of one frame, grouped
#[derive(Debug, Default)]
pub struct FrameContents {
    calls: Vec<Call>,
    top_level: Vec<CallId>,
    binary_bytes: u64,
}

impl FrameContents {
    pub(crate) fn new(calls: Vec<Call>, top_level: Vec<CallId>, binary_bytes: u64) -> Self {
        FrameContents {
            calls,
            top_level,
            binary_bytes,
        }
    }

    /// Every call of the frame, in sequence order
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Call at `id`
    pub fn call(&self, id: CallId) -> &Call {
        &self.calls[id.index()]
    }

    /// Calls attached directly to the frame
    pub fn top_level(&self) -> &[CallId] {
        &self.top_level
    }

    /// Iterate the top-level calls
    pub fn top_level_calls(&self) -> impl Iterator<Item = &Call> + '_ {
        self.top_level.iter().map(move |id| self.call(*id))
    }

    /// Children of `parent`
    pub fn children_of(&self, parent: Parent) -> &[CallId] {
        match parent {
            Parent::Frame => &self.top_level,
            Parent::Call(id) => self.call(id).children(),
        }
    }

    /// Number of calls
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if the frame decoded no calls
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Did grouping leave every call at top level?
    pub fn is_flat(&self) -> bool {
        self.top_level.len() == self.calls.len()
    }

    /// Total size of blob arguments in the frame
    pub fn binary_bytes(&self) -> u64 {
        self.binary_bytes
    }

    /// Id of the call with sequence number `no`
    pub fn find_by_no(&self, no: CallNo) -> Option<CallId> {
        self.calls
            .binary_search_by_key(&no, Call::no)
            .ok()
            .map(|i| CallId(i as u32))
    }

    /// First call of the frame
    pub fn first(&self) -> Option<CallId> {
        (!self.calls.is_empty()).then_some(CallId(0))
    }

    /// Last call of the frame
    pub fn last(&self) -> Option<CallId> {
        self.calls.len().checked_sub(1).map(|i| CallId(i as u32))
    }

    /// Ids in pre-order (group header before its children)
    pub fn walk(&self) -> Vec<(CallId, usize)> {
        let mut out = Vec::with_capacity(self.calls.len());
        let mut stack: Vec<(CallId, usize)> = self.top_level.iter().rev().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            for child in self.call(id).children().iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }
}

/// A call inside a materialized frame
#[derive(Debug, Clone)]
pub struct CallRef {
    frame: usize,
    contents: Arc<FrameContents>,
    id: CallId,
}

impl CallRef {
    /// Reference to `id` within `contents` of frame `frame`
    pub fn new(frame: usize, contents: Arc<FrameContents>, id: CallId) -> Self {
        CallRef { frame, contents, id }
    }

    /// Owning frame number
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Arena id within the frame
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Contents of the owning frame
    pub fn contents(&self) -> &Arc<FrameContents> {
        &self.contents
    }

    /// The call
    pub fn call(&self) -> &Call {
        self.contents.call(self.id)
    }

    /// Sequence number of the call
    pub fn no(&self) -> CallNo {
        self.call().no()
    }
}

/// One frame of the trace
#[derive(Debug)]
pub struct Frame {
    number: usize,
    declared_calls: u64,
    last_call_no: Option<CallNo>,
    contents: OnceCell<Arc<FrameContents>>,
}

impl Frame {
    /// Frame known from the index, not yet materialized
    pub fn new(number: usize, declared_calls: u64, last_call_no: Option<CallNo>) -> Self {
        Frame {
            number,
            declared_calls,
            last_call_no,
            contents: OnceCell::new(),
        }
    }

    /// Frame materialized during a sequential load
    pub fn loaded(number: usize, contents: FrameContents, last_call_no: Option<CallNo>) -> Self {
        Frame {
            number,
            declared_calls: contents.len() as u64,
            last_call_no,
            contents: OnceCell::with_value(Arc::new(contents)),
        }
    }

    /// Ordinal frame number
    pub fn number(&self) -> usize {
        self.number
    }

    /// Number of calls the index recorded for this frame
    pub fn declared_calls(&self) -> u64 {
        self.declared_calls
    }

    /// Sequence number of the frame's last call, when known
    pub fn last_call_no(&self) -> Option<CallNo> {
        self.last_call_no
    }

    /// Has the frame been materialized?
    pub fn is_loaded(&self) -> bool {
        self.contents.get().is_some()
    }

    /// Materialized contents, if loaded
    pub fn contents(&self) -> Option<Arc<FrameContents>> {
        self.contents.get().cloned()
    }

    /// Blob bytes of the frame, 0 until loaded
    pub fn binary_bytes(&self) -> u64 {
        self.contents.get().map_or(0, |c| c.binary_bytes())
    }

    pub(crate) fn get_or_try_load<F, E>(&self, load: F) -> Result<Arc<FrameContents>, E>
    where
        F: FnOnce() -> Result<FrameContents, E>,
    {
        self.contents
            .get_or_try_init(|| load().map(Arc::new))
            .cloned()
    }
}
