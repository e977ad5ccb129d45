//! Data-flow facts shared by the analyze and compact passes.
//!
//! The [`OptimizationContext`] records, for every parameter, each expression that reads
//! it and each expression that writes it, together with the label, call and return
//! indexes the compaction rules need. All maps are keyed by arena handle.
//!
//! Events are derived facts: whenever compaction rewrites the tree the context is
//! rebuilt by [`crate::optimizer::analyze`], so rules never observe stale events. Only
//! the call destinations recorded by return-value recovery survive a rebuild, since they
//! cannot be derived from the tree.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::tree::{ExprId, FunctionId, OperandRole};

/// A parameter read by some expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadEvent {
    /// Expression holding the parameter as an operand
    pub expression: ExprId,
    /// Operand position the parameter occupies
    pub role: OperandRole,
}

/// A parameter written by some expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteEvent {
    /// Assignment, step or call performing the write
    pub expression: ExprId,
    /// Value written, `None` if not a plain assignment
    pub value: Option<ExprId>,
}

/// Read/write events and indexes of an expression tree.
#[derive(Debug, Default)]
pub struct OptimizationContext {
    reads: FxHashMap<ExprId, Vec<ReadEvent>>,
    writes: FxHashMap<ExprId, Vec<WriteEvent>>,
    gotos: FxHashMap<ExprId, Vec<ExprId>>,
    calls: FxHashMap<FunctionId, Vec<ExprId>>,
    returns: FxHashMap<FunctionId, Vec<ExprId>>,
    blocks: FxHashMap<FunctionId, Vec<ExprId>>,
    live: FxHashSet<ExprId>,
    call_destinations: FxHashMap<ExprId, ExprId>,
    worklist: Vec<ExprId>,
}

impl OptimizationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all derived events, keeping call destinations and the worklist.
    pub fn clear_events(&mut self) {
        self.reads.clear();
        self.writes.clear();
        self.gotos.clear();
        self.calls.clear();
        self.returns.clear();
        self.blocks.clear();
        self.live.clear();
    }

    pub(crate) fn record_read(&mut self, param: ExprId, expression: ExprId, role: OperandRole) {
        self.reads
            .entry(param)
            .or_default()
            .push(ReadEvent { expression, role });
    }

    pub(crate) fn record_write(&mut self, param: ExprId, expression: ExprId, value: Option<ExprId>) {
        self.writes
            .entry(param)
            .or_default()
            .push(WriteEvent { expression, value });
    }

    pub(crate) fn record_goto(&mut self, label: ExprId, goto: ExprId) {
        self.gotos.entry(label).or_default().push(goto);
    }

    pub(crate) fn record_call(&mut self, function: FunctionId, call: ExprId) {
        self.calls.entry(function).or_default().push(call);
    }

    pub(crate) fn record_return(&mut self, function: FunctionId, ret: ExprId) {
        self.returns.entry(function).or_default().push(ret);
    }

    pub(crate) fn record_block(&mut self, function: FunctionId, block: ExprId) {
        self.blocks.entry(function).or_default().push(block);
        self.live.insert(block);
    }

    /// Reads of `param` in tree order.
    #[must_use]
    pub fn reads(&self, param: ExprId) -> &[ReadEvent] {
        self.reads.get(&param).map(Vec::as_slice).unwrap_or_default()
    }

    /// Writes of `param` in tree order.
    #[must_use]
    pub fn writes(&self, param: ExprId) -> &[WriteEvent] {
        self.writes.get(&param).map(Vec::as_slice).unwrap_or_default()
    }

    /// Gotos targeting `label`.
    #[must_use]
    pub fn gotos(&self, label: ExprId) -> &[ExprId] {
        self.gotos.get(&label).map(Vec::as_slice).unwrap_or_default()
    }

    /// Call expressions targeting `function`.
    #[must_use]
    pub fn calls_to(&self, function: FunctionId) -> &[ExprId] {
        self.calls.get(&function).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns of `function`, excluding those inside deferred action blocks.
    #[must_use]
    pub fn returns_of(&self, function: FunctionId) -> &[ExprId] {
        self.returns.get(&function).map(Vec::as_slice).unwrap_or_default()
    }

    /// Blocks of `function` in discovery order, root first.
    #[must_use]
    pub fn blocks_of(&self, function: FunctionId) -> &[ExprId] {
        self.blocks.get(&function).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns `true` if `block` is still reachable from an output function.
    #[must_use]
    pub fn is_live(&self, block: ExprId) -> bool {
        self.live.contains(&block)
    }

    /// Records that `call` must be rewritten into an assignment to `destination`.
    pub fn set_call_destination(&mut self, call: ExprId, destination: ExprId) {
        self.call_destinations.insert(call, destination);
    }

    /// Removes and returns the pending destination of `call`.
    pub fn take_call_destination(&mut self, call: ExprId) -> Option<ExprId> {
        self.call_destinations.remove(&call)
    }

    /// Returns `true` if `call` has a pending destination.
    #[must_use]
    pub fn has_call_destination(&self, call: ExprId) -> bool {
        self.call_destinations.contains_key(&call)
    }

    /// Schedules `block` for compaction.
    pub fn push_block(&mut self, block: ExprId) {
        self.worklist.push(block);
    }

    /// Next block to compact, most recently scheduled first.
    pub fn pop_block(&mut self) -> Option<ExprId> {
        self.worklist.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_default_to_empty() {
        let ctx = OptimizationContext::new();
        assert!(ctx.reads(ExprId::new(0)).is_empty());
        assert!(ctx.writes(ExprId::new(0)).is_empty());
        assert!(ctx.calls_to(FunctionId::new(0)).is_empty());
    }

    #[test]
    fn test_clear_keeps_call_destinations() {
        let mut ctx = OptimizationContext::new();
        ctx.record_read(ExprId::new(1), ExprId::new(2), OperandRole::Right);
        ctx.record_write(ExprId::new(1), ExprId::new(3), None);
        ctx.set_call_destination(ExprId::new(4), ExprId::new(1));
        ctx.push_block(ExprId::new(5));

        ctx.clear_events();

        assert!(ctx.reads(ExprId::new(1)).is_empty());
        assert!(ctx.writes(ExprId::new(1)).is_empty());
        assert!(ctx.has_call_destination(ExprId::new(4)));
        assert_eq!(ctx.pop_block(), Some(ExprId::new(5)));
        assert_eq!(ctx.take_call_destination(ExprId::new(4)), Some(ExprId::new(1)));
        assert!(!ctx.has_call_destination(ExprId::new(4)));
    }
}
