//! Node arena, connection set and block-synchronous execution.
//!
//! Nodes live in a slot arena addressed by generation-checked [`NodeId`]s, so
//! a handle to a removed node can never reach the node that later reuses its
//! slot. Connections are port to port (port 0 = left, port 1 = right) and must
//! form a DAG; `connect` rejects anything else before it is recorded.
//!
//! ```text
//!   osc ──▶ env ──▶ filter ──▶ delay        reverb
//!   └──────── scheduled, in topo order ────┘  (isolated: idle)
//! ```
//!
//! The execution order is rebuilt on the control thread whenever the
//! topology changes. `process_audio` only walks that precomputed order,
//! handing the running stereo buffer from node to node.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dsp::param::ParamHandle;
use crate::error::GraphError;
use crate::graph::node::{ProcessSpec, ProcessingNode, StereoBlock};
use crate::io::midi::TimedEvent;

/// Number of ports on every node: one per stereo channel.
pub const PORTS_PER_NODE: usize = 2;

/// Handle to a node inside one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// A directed port-to-port edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub src: NodeId,
    pub src_port: usize,
    pub dst: NodeId,
    pub dst_port: usize,
}

/// Shared start/stop gate. Cloning hands the same gate to another thread.
#[derive(Debug, Clone, Default)]
pub struct RunSwitch(Arc<AtomicBool>);

impl RunSwitch {
    pub fn start(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Slot {
    generation: u32,
    node: Option<Box<dyn ProcessingNode>>,
}

pub struct Graph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    connections: Vec<Connection>,
    /// Slot indices in execution order.
    order: Vec<usize>,
    spec: Option<ProcessSpec>,
    running: RunSwitch,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            connections: Vec::new(),
            order: Vec::new(),
            spec: None,
            running: RunSwitch::default(),
        }
    }

    /// Take ownership of `node`.
    ///
    /// If the graph is already prepared the node is prepared straight away
    /// and not inserted when that fails.
    pub fn add_node(&mut self, mut node: Box<dyn ProcessingNode>) -> Result<NodeId, GraphError> {
        if let Some(spec) = self.spec {
            node.prepare(&spec)?;
        }

        let kind = node.kind();
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| GraphError::IdSpaceExhausted)?;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        };

        debug!("graph_add: {} node {id}", kind.as_str());
        Ok(id)
    }

    /// Remove a node together with every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Box<dyn ProcessingNode>, GraphError> {
        self.check(id)?;

        let slot = &mut self.slots[id.index as usize];
        let mut node = slot.node.take().ok_or(GraphError::UnknownNode(id))?;
        node.release();

        // a slot whose generation would wrap is retired for good
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(id.index);
        }

        self.connections.retain(|c| c.src != id && c.dst != id);
        self.rebuild_order();

        debug!("graph_remove: node {id}");
        Ok(node)
    }

    /// Register `src:src_port -> dst:dst_port`.
    pub fn connect(
        &mut self,
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
    ) -> Result<(), GraphError> {
        let result = self.validate_connection(src, src_port, dst, dst_port);
        if let Err(err) = &result {
            warn!("graph_connect rejected: {err}");
            return result;
        }

        self.connections.push(Connection {
            src,
            src_port,
            dst,
            dst_port,
        });
        self.rebuild_order();

        debug!("graph_connect: {src}:{src_port} → {dst}:{dst_port}");
        Ok(())
    }

    pub fn disconnect(
        &mut self,
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
    ) -> Result<(), GraphError> {
        let wanted = Connection {
            src,
            src_port,
            dst,
            dst_port,
        };
        let position = self
            .connections
            .iter()
            .position(|c| *c == wanted)
            .ok_or(GraphError::UnknownConnection {
                src,
                src_port,
                dst,
                dst_port,
            })?;

        self.connections.remove(position);
        self.rebuild_order();

        debug!("graph_disconnect: {src}:{src_port} → {dst}:{dst_port}");
        Ok(())
    }

    /// Remove every connection leaving `src` on any port.
    pub fn disconnect_outputs(&mut self, src: NodeId) -> Result<usize, GraphError> {
        self.check(src)?;
        let before = self.connections.len();
        self.connections.retain(|c| c.src != src);
        let removed = before - self.connections.len();
        if removed > 0 {
            self.rebuild_order();
            debug!("graph_disconnect: {removed} outputs of {src}");
        }
        Ok(removed)
    }

    fn validate_connection(
        &self,
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
    ) -> Result<(), GraphError> {
        self.check(src)?;
        self.check(dst)?;

        if src_port >= PORTS_PER_NODE {
            return Err(GraphError::InvalidPort {
                node: src,
                port: src_port,
            });
        }
        if dst_port >= PORTS_PER_NODE {
            return Err(GraphError::InvalidPort {
                node: dst,
                port: dst_port,
            });
        }
        if src == dst {
            return Err(GraphError::SelfConnection(src));
        }

        let candidate = Connection {
            src,
            src_port,
            dst,
            dst_port,
        };
        if self.connections.contains(&candidate) {
            return Err(GraphError::DuplicateConnection {
                src,
                src_port,
                dst,
                dst_port,
            });
        }

        if self.reaches(dst, src) {
            return Err(GraphError::CycleDetected { src, dst });
        }

        Ok(())
    }

    /// Depth-first search along existing edges.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = vec![false; self.slots.len()];
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let index = current.index as usize;
            if visited[index] {
                continue;
            }
            visited[index] = true;

            stack.extend(
                self.connections
                    .iter()
                    .filter(|c| c.src == current)
                    .map(|c| c.dst),
            );
        }

        false
    }

    /// Kahn's algorithm over connected nodes; lowest slot index first on ties.
    fn rebuild_order(&mut self) {
        let n = self.slots.len();
        let mut in_degree = vec![0usize; n];
        let mut connected = vec![false; n];

        // parallel edges on both ports count once
        let mut edges: Vec<(usize, usize)> = self
            .connections
            .iter()
            .map(|c| (c.src.index as usize, c.dst.index as usize))
            .collect();
        edges.sort_unstable();
        edges.dedup();

        for &(src, dst) in &edges {
            connected[src] = true;
            connected[dst] = true;
            in_degree[dst] += 1;
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| connected[i] && in_degree[i] == 0)
            .map(Reverse)
            .collect();

        self.order.clear();
        while let Some(Reverse(index)) = ready.pop() {
            self.order.push(index);
            for &(src, dst) in &edges {
                if src == index {
                    in_degree[dst] -= 1;
                    if in_degree[dst] == 0 {
                        ready.push(Reverse(dst));
                    }
                }
            }
        }

        debug!("graph_sort: {} nodes in topo order", self.order.len());
    }

    fn check(&self, id: NodeId) -> Result<(), GraphError> {
        match self.slots.get(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.node.is_some() => Ok(()),
            _ => Err(GraphError::UnknownNode(id)),
        }
    }

    /// Prepare every owned node. Not realtime-safe.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> Result<(), GraphError> {
        let spec = ProcessSpec::new(sample_rate, max_block_size);
        spec.validate()?;

        self.spec = None;
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                node.prepare(&spec)?;
            }
        }
        self.spec = Some(spec);

        info!(
            "graph prepared: {} nodes at {sample_rate} Hz, {max_block_size} frames",
            self.node_count()
        );
        Ok(())
    }

    /// Stop and release every node. `prepare` must run again before `start`.
    pub fn release(&mut self) {
        self.running.stop();
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                node.release();
            }
        }
        self.spec = None;
        info!("graph released");
    }

    pub fn start(&self) -> Result<(), GraphError> {
        if self.spec.is_none() {
            return Err(GraphError::NotPrepared);
        }
        self.running.start();
        info!("graph started");
        Ok(())
    }

    pub fn stop(&self) {
        self.running.stop();
        info!("graph stopped");
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    pub fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    /// A handle to this graph's start/stop gate for another thread.
    pub fn run_switch(&self) -> RunSwitch {
        self.running.clone()
    }

    /// Run one block in place. Realtime-safe.
    ///
    /// Leaves the buffers untouched while stopped or unprepared. Frames past
    /// the prepared maximum block size are not processed.
    pub fn process_audio(&mut self, left: &mut [f32], right: &mut [f32], events: &[TimedEvent]) {
        let Some(spec) = self.spec else {
            return;
        };
        if !self.running.is_running() {
            return;
        }

        let n = left.len().min(right.len()).min(spec.max_block_size);
        debug_assert!(left.len() <= spec.max_block_size);

        let mut block = StereoBlock::new(&mut left[..n], &mut right[..n]);
        for &index in &self.order {
            if let Some(node) = self.slots[index].node.as_mut() {
                node.process(&mut block, events);
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn ProcessingNode> {
        self.check(id).ok()?;
        self.slots[id.index as usize].node.as_deref()
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut (dyn ProcessingNode + 'static)> {
        self.check(id).ok()?;
        self.slots[id.index as usize].node.as_deref_mut()
    }

    /// Control handle for the named parameter of `id`.
    pub fn param(&self, id: NodeId, name: &str) -> Option<ParamHandle> {
        self.node(id)?.param_by_name(name)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.check(id).is_ok()
    }

    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Scheduled nodes in the order `process_audio` runs them.
    pub fn execution_order(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .map(|&index| NodeId {
                index: index as u32,
                generation: self.slots[index].generation,
            })
            .collect()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
