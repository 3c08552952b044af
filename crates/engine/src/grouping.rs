//! Group reconstruction
//!
//! Turns the flat, flag-annotated call sequence of one frame into a tree of
//! groups. Debug-group markers (push / pop) open and close named groups;
//! render calls close runs of state-setting calls.
//!
//! ## Rules
//!
//! Per call, first match wins:
//!
//! 1. Empty stack: the call goes to top level. If the filter accepts it and it
//!    is neither a pop nor a frame terminator it opens a group. A push arms
//!    "start new group" and deepens the push depth; anything else disarms it.
//! 2. Render: attach to the open group and close its child list. Unless a new
//!    group is pending, label the group with the render call's name, pop it
//!    and arm "start new group".
//! 3. Pop: unless a new group is pending, the open group becomes
//!    "State changes" and is popped. A remaining group receives the pop, is
//!    labeled after its debug-group name and popped. With nothing left the
//!    pop is unpaired and goes to top level.
//! 4. Push: inside a push group, attach. Otherwise close the open group as
//!    "State changes" and attach to what remains (or top level). An accepted
//!    push then opens a group.
//! 5. Anything else: attach; an accepted call opens the pending group.
//! 6. A frame terminator that ended up inside a group, with a group still
//!    open after the steps above, moves to top level and the innermost open
//!    group is relabeled "State changes", whatever label it had. A terminator
//!    whose own render or pop closed the last group stays in it.
//!
//! Groups still open when the frame ends are labeled "State changes".

use std::sync::Arc;
use tracedex_core::{CallNo, RawCall};

use crate::call::{Call, CallId, Parent};
use crate::filter::CallFilter;
use crate::frame::FrameContents;
use crate::signature_cache::SignatureCache;

/// Label of groups of state-setting calls
pub const STATE_GROUP: &str = "State changes";

/// Debug-group label for `name`
pub fn debug_group_label(name: &str) -> String {
    format!("\"{}\" group", name)
}

/// Grouping state carried across the calls of one frame
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupState {
    /// Open group headers, innermost last
    pub stack: Vec<CallId>,
    /// Number of open groups opened by push markers
    pub push_depth: usize,
    /// The next accepted call should open a group
    pub start_new_group: bool,
}

/// Builds the group tree of one frame, call by call
pub struct FrameAssembler<'a> {
    sigs: &'a SignatureCache,
    filter: &'a dyn CallFilter,
    calls: Vec<Call>,
    top_level: Vec<CallId>,
    binary_bytes: u64,
    state: GroupState,
}

impl<'a> FrameAssembler<'a> {
    /// Empty assembler
    pub fn new(sigs: &'a SignatureCache, filter: &'a dyn CallFilter) -> Self {
        FrameAssembler {
            sigs,
            filter,
            calls: Vec::new(),
            top_level: Vec::new(),
            binary_bytes: 0,
            state: GroupState::default(),
        }
    }

    /// Calls added so far
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if no call was added
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Current grouping state
    pub fn state(&self) -> &GroupState {
        &self.state
    }

    /// Sequence number of the last call added
    pub fn last_call_no(&self) -> Option<CallNo> {
        self.calls.last().map(Call::no)
    }

    /// Bind `raw` to the signature cache and place it in the tree
    ///
    /// Returns true if the call ends the frame.
    pub fn push(&mut self, raw: RawCall) -> bool {
        let RawCall {
            no,
            sig,
            mut args,
            flags,
        } = raw;
        let sig = self.sigs.bind(&sig);
        self.sigs.intern_args(&mut args);
        let call = Call::new(no, sig, args, flags);
        self.binary_bytes += call.blob_bytes();

        let id = CallId(self.calls.len() as u32);
        self.calls.push(call);
        self.place(id);
        flags.is_end_frame()
    }

    /// Close open groups and hand over the frame contents
    pub fn finish(mut self) -> FrameContents {
        while let Some(top) = self.state.stack.pop() {
            self.label(top, STATE_GROUP.to_string());
            self.close(top);
        }
        FrameContents::new(self.calls, self.top_level, self.binary_bytes)
    }

    // ========================================================================
    // Rules
    // ========================================================================

    fn place(&mut self, id: CallId) {
        let flags = self.calls[id.index()].flags();
        if self.state.stack.is_empty() {
            self.on_top_level(id);
        } else if flags.is_render() {
            self.on_render(id);
        } else if flags.is_pop() {
            self.on_pop(id);
        } else if flags.is_push() {
            self.on_push(id);
        } else {
            self.on_ordinary(id);
        }
        if flags.is_end_frame() {
            self.on_end_frame(id);
        }
    }

    fn on_top_level(&mut self, id: CallId) {
        self.attach_top_level(id);
        if !self.accepts(id) {
            return;
        }
        let flags = self.calls[id.index()].flags();
        if !flags.is_pop() && !flags.is_end_frame() {
            self.state.stack.push(id);
        }
        if flags.is_push() {
            self.state.start_new_group = true;
            self.state.push_depth += 1;
        } else {
            self.state.start_new_group = false;
        }
    }

    fn on_render(&mut self, id: CallId) {
        let Some(top) = self.top() else { return };
        self.attach(id, top);
        self.close(top);
        if !self.state.start_new_group {
            let name = self.calls[id.index()].name().to_string();
            self.label(top, name);
            self.state.stack.pop();
            self.state.start_new_group = true;
        }
    }

    fn on_pop(&mut self, id: CallId) {
        if let Some(top) = self.top() {
            self.close(top);
            if !self.state.start_new_group {
                self.label(top, STATE_GROUP.to_string());
                self.state.stack.pop();
            }
        }
        match self.top() {
            Some(parent) => {
                self.attach(id, parent);
                self.close(parent);
                let label = self.debug_label(parent);
                self.label(parent, label);
                self.state.stack.pop();
            }
            None => self.attach_top_level(id),
        }
        self.state.push_depth = self.state.push_depth.saturating_sub(1);
        self.state.start_new_group = true;
    }

    fn on_push(&mut self, id: CallId) {
        if self.state.push_depth > 0 {
            if let Some(top) = self.top() {
                self.attach(id, top);
            }
        } else {
            if let Some(top) = self.state.stack.pop() {
                self.label(top, STATE_GROUP.to_string());
                self.close(top);
            }
            match self.top() {
                Some(parent) => self.attach(id, parent),
                None => self.attach_top_level(id),
            }
        }
        if self.accepts(id) {
            self.state.stack.push(id);
            self.state.push_depth += 1;
            self.state.start_new_group = true;
        }
    }

    fn on_ordinary(&mut self, id: CallId) {
        let Some(top) = self.top() else { return };
        self.attach(id, top);
        if self.state.start_new_group && self.accepts(id) {
            self.state.stack.push(id);
            self.state.start_new_group = false;
        }
    }

    fn on_end_frame(&mut self, id: CallId) {
        if self.top() == Some(id) {
            self.state.stack.pop();
        }
        // A render or pop on the same call may already have closed the group.
        let Some(top) = self.top() else { return };
        if !matches!(self.calls[id.index()].parent, Parent::Call(_)) {
            return;
        }
        self.label(top, STATE_GROUP.to_string());
        self.detach(id);
        self.attach_top_level(id);
    }

    // ========================================================================
    // Tree edits
    // ========================================================================

    fn top(&self) -> Option<CallId> {
        self.state.stack.last().copied()
    }

    fn accepts(&self, id: CallId) -> bool {
        self.filter.accepts(&self.calls[id.index()])
    }

    fn attach(&mut self, child: CallId, parent: CallId) {
        self.calls[child.index()].parent = Parent::Call(parent);
        self.calls[parent.index()].children.push(child);
    }

    fn attach_top_level(&mut self, child: CallId) {
        self.calls[child.index()].parent = Parent::Frame;
        self.top_level.push(child);
    }

    fn detach(&mut self, child: CallId) {
        match self.calls[child.index()].parent {
            Parent::Call(parent) => {
                self.calls[parent.index()].children.retain(|c| *c != child);
            }
            Parent::Frame => self.top_level.retain(|c| *c != child),
        }
    }

    fn close(&mut self, id: CallId) {
        self.calls[id.index()].children_finished = true;
    }

    fn label(&mut self, id: CallId, text: String) {
        self.calls[id.index()].alternate_text = Some(text);
    }

    /// Label for a debug group closed by a pop
    ///
    /// Without a group-name argument the group takes the name of the last
    /// render call directly under it, else its own name.
    fn debug_label(&self, id: CallId) -> String {
        let header = &self.calls[id.index()];
        if let Some(name) = header.group_name() {
            return debug_group_label(&name);
        }
        let last_render = header
            .children()
            .iter()
            .rev()
            .map(|c| &self.calls[c.index()])
            .find(|c| c.flags().is_render());
        match last_render {
            Some(render) => render.name().to_string(),
            None => debug_group_label(header.name()),
        }
    }
}

/// Group a complete frame in one go
pub fn group_calls(
    calls: impl IntoIterator<Item = RawCall>,
    sigs: &SignatureCache,
    filter: &dyn CallFilter,
) -> Arc<FrameContents> {
    let mut assembler = FrameAssembler::new(sigs, filter);
    for call in calls {
        assembler.push(call);
    }
    Arc::new(assembler.finish())
}
