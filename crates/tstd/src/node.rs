//! The buffering model's node graph: an arena of [`Node`]s addressed by
//! [`NodeId`], replacing `bufferingModel.h`'s `BufModelNode` pointer tree
//! (`NODE_VOID` / `NODE_BUFFER` / `NODE_FILTER`) with a `Vec<Node>` so the
//! graph has no interior pointers and can be walked, cloned, or serialized
//! without `Rc`/`unsafe`.

use std::collections::HashMap;

use crate::buffer::Buffer;
use crate::error::{Result, TStdError};

/// Index into a [`Model`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Underflow policy, shared by every buffer in a model (BDAV §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TStdOptions {
    /// If `true`, an underflow is a fatal error rather than a throttled
    /// warning.
    pub abort_on_underflow: bool,
    /// Minimum 27 MHz-tick interval between two underflow warnings for the
    /// same buffer.
    pub underflow_warn_timeout: u64,
}

impl Default for TStdOptions {
    fn default() -> Self {
        Self { abort_on_underflow: false, underflow_warn_timeout: 27_000_000 }
    }
}

/// A routing decision made by a [`Filter`] node: which child to route to,
/// given some per-call context. `-1` is the reserved "no match" label.
pub trait FilterDecision: std::fmt::Debug {
    /// Returns the label of the child to route to, or `-1` for the default
    /// (void, unless a default route was registered) child.
    fn decide(&self, context: &FilterContext) -> i64;
}

/// Context passed to a [`FilterDecision`] at update/check time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterContext {
    /// The incoming transport packet's PID, for a PID-match filter.
    pub pid: Option<u16>,
}

/// A PID-match filter: routes by exact PID equality, falling back to the
/// reserved `-1` default route (BDAV §4.6 "Decision functions currently
/// used: PID-match").
#[derive(Debug, Default)]
pub struct PidMatch;

impl FilterDecision for PidMatch {
    fn decide(&self, context: &FilterContext) -> i64 {
        context.pid.map(|pid| pid as i64).unwrap_or(-1)
    }
}

/// A routing node: evaluates a [`FilterDecision`] and forwards to the
/// matching child, or to a registered default (label `-1`) child.
pub struct Filter {
    routes: HashMap<i64, NodeId>,
    decision: Box<dyn FilterDecision>,
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter").field("routes", &self.routes).field("decision", &self.decision).finish()
    }
}

impl Filter {
    /// Creates a filter with no routes registered.
    pub fn new(decision: Box<dyn FilterDecision>) -> Self {
        Self { routes: HashMap::new(), decision }
    }

    /// Registers `child` as the destination for `label` (`-1` registers the
    /// default route).
    pub fn add_route(&mut self, label: i64, child: NodeId) {
        self.routes.insert(label, child);
    }

    fn resolve(&self, context: &FilterContext) -> Result<NodeId> {
        let label = self.decision.decide(context);
        self.routes
            .get(&label)
            .or_else(|| self.routes.get(&-1))
            .copied()
            .ok_or(TStdError::NoFilterRoute(label))
    }
}

/// One arena slot: void (discard), a leaf buffer, or a routing filter.
#[derive(Debug)]
pub enum Node {
    /// Data arriving here is discarded.
    Void,
    /// Data arriving here fills a buffer.
    Buffer(Buffer),
    /// Data arriving here is routed to a child node.
    Filter(Filter),
}

/// A complete buffering model: an arena of nodes plus the shared
/// underflow policy.
#[derive(Debug)]
pub struct Model {
    nodes: Vec<Node>,
    outputs: HashMap<usize, NodeId>,
    root: NodeId,
    options: TStdOptions,
}

impl Model {
    /// Creates a model whose root is a single void node.
    pub fn new(options: TStdOptions) -> Self {
        Self { nodes: vec![Node::Void], outputs: HashMap::new(), root: NodeId(0), options }
    }

    /// Wires `buffer`'s drained output to flow into `destination`
    /// (`bufferingModel.h`'s `setBufferOutput`).
    pub fn link_output(&mut self, buffer: NodeId, destination: NodeId) {
        self.outputs.insert(buffer.0, destination);
    }

    /// This model's root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Replaces the root node id (used once the caller has built the real
    /// root via [`Self::insert`]).
    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    /// Inserts a node, returning its id.
    pub fn insert(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(TStdError::InvalidNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(TStdError::InvalidNode(id))
    }

    /// Borrows the buffer at `id`, failing if it is not a buffer node.
    pub fn buffer(&self, id: NodeId) -> Result<&Buffer> {
        match self.get(id)? {
            Node::Buffer(buf) => Ok(buf),
            _ => Err(TStdError::InvalidNode(id)),
        }
    }

    /// A node's current free capacity, for a parent's `dont_overflow_output`
    /// clipping check; void and filter nodes report unbounded free capacity.
    fn free_capacity(&self, id: NodeId) -> Result<u64> {
        match self.get(id)? {
            Node::Void => Ok(u64::MAX),
            Node::Buffer(buf) => Ok(buf.free_capacity_bits()),
            Node::Filter(_) => Ok(u64::MAX),
        }
    }

    /// Drives one update through the tree starting at `id`: feeds
    /// `input_bits` in at `timestamp`, propagating whatever each buffer
    /// drains to its own `output` node, recursively (BDAV §4.6 rule 6).
    ///
    /// `output` wiring for buffer nodes is expressed as a child in the
    /// arena reached via [`Self::link_output`]; nodes with no linked output
    /// discard whatever they drain.
    pub fn update(&mut self, id: NodeId, timestamp: u64, input_bits: u64, filling_bitrate: u64, context: &FilterContext) -> Result<()> {
        match self.get(id)? {
            Node::Void => Ok(()),
            Node::Filter(_) => {
                let child = match self.get(id)? {
                    Node::Filter(filter) => filter.resolve(context)?,
                    _ => unreachable!(),
                };
                self.update(child, timestamp, input_bits, filling_bitrate, context)
            }
            Node::Buffer(_) => {
                let output = self.outputs.get(&id.0).copied();
                let downstream_free = match output {
                    Some(next) => Some(self.free_capacity(next)?),
                    None => None,
                };
                let outcome = match self.get_mut(id)? {
                    Node::Buffer(buf) => buf.update(timestamp, input_bits, filling_bitrate, downstream_free, &self.options)?,
                    _ => unreachable!(),
                };
                if let Some(next) = output {
                    if outcome.transferred_bits > 0 {
                        self.update(next, timestamp, outcome.transferred_bits, filling_bitrate, context)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Non-consuming check variant of [`Self::update`] (BDAV §4.6): reports
    /// whether `input_bits` would fit into the node reached from `id`
    /// without overflowing, routing through filters the same way `update`
    /// does but never mutating buffer state.
    pub fn check(&self, id: NodeId, timestamp: u64, input_bits: u64, filling_bitrate: u64, context: &FilterContext) -> Result<crate::buffer::CheckOutcome> {
        match self.get(id)? {
            Node::Void => Ok(crate::buffer::CheckOutcome { fits: true, delay: None }),
            Node::Filter(filter) => {
                let child = filter.resolve(context)?;
                self.check(child, timestamp, input_bits, filling_bitrate, context)
            }
            Node::Buffer(buf) => Ok(buf.check(timestamp, input_bits, filling_bitrate)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Discipline;

    #[test]
    fn pid_filter_default_routes_unmatched_pid_to_void() {
        let mut model = Model::new(TStdOptions::default());
        let void = model.insert(Node::Void);
        let matched = model.insert(Node::Buffer(Buffer::new("B", 1_000_000, true, false, Discipline::RemovalTimestamp)));

        let mut filter = Filter::new(Box::new(PidMatch));
        filter.add_route(0x0011, matched);
        filter.add_route(-1, void);
        let filter_id = model.insert(Node::Filter(filter));
        model.set_root(filter_id);

        let ctx_default = FilterContext { pid: Some(0x1FFF) };
        model.update(filter_id, 0, 800, 0, &ctx_default).unwrap();
        assert_eq!(model.buffer(matched).unwrap().level_bits(), 0);

        let ctx_matched = FilterContext { pid: Some(0x0011) };
        model.update(filter_id, 0, 800, 0, &ctx_matched).unwrap();
        assert_eq!(model.buffer(matched).unwrap().level_bits(), 800);
    }

    #[test]
    fn transfer_propagates_to_linked_output() {
        let mut model = Model::new(TStdOptions::default());
        let eb = model.insert(Node::Buffer(Buffer::new("EB", 1_000_000, true, false, Discipline::RemovalTimestamp)));
        let tb = model.insert(Node::Buffer(Buffer::new("TB", 1_000_000, true, false, Discipline::Leaking { bits_per_tick: 1.0 })));
        model.link_output(tb, eb);
        model.set_root(tb);

        let ctx = FilterContext::default();
        model.update(tb, 0, 1000, 0, &ctx).unwrap();
        model.update(tb, 2000, 0, 0, &ctx).unwrap();
        assert!(model.buffer(eb).unwrap().level_bits() > 0);
    }
}
