use super::model::*;
use crate::block::{BlockData, BlockKind};
use crate::error::{ContentError, GraphError};
use ahash::AHashSet;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// In-memory blocks and edges of one scenario.
///
/// Every mutation keeps the graph free of dangling edges: an edge is only
/// ever inserted between existing blocks, and removing a block removes its
/// edges in the same call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    blocks: Vec<Block>,
    edges: Vec<Edge>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from loaded parts, dropping edges whose endpoints are
    /// missing.
    pub fn from_parts(blocks: Vec<Block>, edges: Vec<Edge>) -> Self {
        let ids: AHashSet<&str> = blocks.iter().map(Block::id).collect();
        let (edges, dangling): (Vec<Edge>, Vec<Edge>) = edges
            .into_iter()
            .partition(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()));
        for edge in &dangling {
            warn!(edge_id = %edge.id, source = %edge.source, target = %edge.target, "Dropping dangling edge");
        }
        Self { blocks, edges }
    }

    pub fn from_scenario(scenario: Scenario) -> Self {
        Self::from_parts(scenario.blocks, scenario.edges)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id() == id)
    }

    fn block_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id() == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_block(&self, id: &str) -> bool {
        self.block(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.edges.is_empty()
    }

    /// Edges leaving `block_id`.
    pub fn outgoing<'a>(&'a self, block_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == block_id)
    }

    /// Create a block of `kind` with catalog defaults and a fresh id.
    pub fn add_block(&mut self, kind: BlockKind, position: Position) -> &Block {
        self.insert_block(BlockData::for_kind(kind), position)
    }

    /// Insert a block with the given data under a fresh id.
    pub fn insert_block(&mut self, data: BlockData, position: Position) -> &Block {
        let id = self.fresh_id();
        debug!(block_id = %id, block_type = %data.tag(), x = position.x, y = position.y, "Adding block");
        let index = self.blocks.len();
        self.blocks.push(Block::new(id, position, data));
        &self.blocks[index]
    }

    /// Merge `patch` into the fields of block `id`.
    ///
    /// Returns `Ok(false)` when no such block exists: callbacks from the UI
    /// may outlive the block they were created for.
    pub fn update_block_data(&mut self, id: &str, patch: &Value) -> Result<bool, ContentError> {
        match self.block_mut(id) {
            Some(block) => {
                block.data_mut().merge(id, patch)?;
                Ok(true)
            }
            None => {
                debug!(block_id = %id, "Ignoring field update for missing block");
                Ok(false)
            }
        }
    }

    pub fn move_block(&mut self, id: &str, position: Position) -> bool {
        match self.block_mut(id) {
            Some(block) => {
                block.position = position;
                true
            }
            None => false,
        }
    }

    /// Remove a block together with every edge touching it.
    pub fn remove_block(&mut self, id: &str) -> RemovalSummary {
        self.remove_blocks([id])
    }

    /// Remove the given blocks and every edge incident to any of them.
    /// Ids that do not exist are ignored.
    pub fn remove_blocks<I, S>(&mut self, ids: I) -> RemovalSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: AHashSet<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        self.remove_where(|b| ids.contains(b.id()), |_| false)
    }

    /// Connect `source` to `target`. Parallel edges are allowed.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        source_handle: Option<&str>,
    ) -> Result<&Edge, GraphError> {
        self.add_connection(&PendingConnection {
            source: source.to_string(),
            source_handle: source_handle.map(str::to_string),
            target: target.to_string(),
            target_handle: None,
        })
    }

    pub fn add_connection(&mut self, connection: &PendingConnection) -> Result<&Edge, GraphError> {
        for endpoint in [&connection.source, &connection.target] {
            if !self.contains_block(endpoint) {
                return Err(GraphError::UnknownBlock(endpoint.clone()));
            }
        }
        let mut edge = Edge::new(
            self.fresh_id(),
            connection.source.clone(),
            connection.target.clone(),
            connection.source_handle.clone(),
        );
        edge.target_handle = connection.target_handle.clone();
        debug!(edge_id = %edge.id, source = %edge.source, target = %edge.target, handle = %edge.handle(), "Adding edge");
        let index = self.edges.len();
        self.edges.push(edge);
        Ok(&self.edges[index])
    }

    pub fn remove_edge(&mut self, id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != id);
        before != self.edges.len()
    }

    /// Remove every selected block and edge. An edge that is selected and
    /// also attached to a removed block is counted once.
    pub fn remove_selected(&mut self) -> RemovalSummary {
        let ids: AHashSet<String> = self
            .blocks
            .iter()
            .filter(|b| b.selected)
            .map(|b| b.id().to_string())
            .collect();
        self.remove_where(|b| ids.contains(b.id()), |e| e.selected)
    }

    pub fn clear(&mut self) -> RemovalSummary {
        let summary = RemovalSummary {
            removed_blocks: self.blocks.len(),
            removed_edges: self.edges.len(),
        };
        self.blocks.clear();
        self.edges.clear();
        info!(blocks = summary.removed_blocks, edges = summary.removed_edges, "Cleared scenario");
        summary
    }

    fn remove_where(
        &mut self,
        remove_block: impl Fn(&Block) -> bool,
        remove_edge: impl Fn(&Edge) -> bool,
    ) -> RemovalSummary {
        let removed: AHashSet<String> = self
            .blocks
            .iter()
            .filter(|&b| remove_block(b))
            .map(|b| b.id().to_string())
            .collect();
        let blocks_before = self.blocks.len();
        let edges_before = self.edges.len();
        // Blocks and edges are pruned in one call so no observer sees an edge
        // pointing at a removed block.
        self.blocks.retain(|b| !removed.contains(b.id()));
        self.edges.retain(|e| {
            !remove_edge(e) && !removed.contains(&e.source) && !removed.contains(&e.target)
        });
        let summary = RemovalSummary {
            removed_blocks: blocks_before - self.blocks.len(),
            removed_edges: edges_before - self.edges.len(),
        };
        if !summary.is_empty() {
            info!(blocks = summary.removed_blocks, edges = summary.removed_edges, "Removed from scenario");
        }
        summary
    }

    pub fn select_block(&mut self, id: &str, selected: bool) -> bool {
        match self.block_mut(id) {
            Some(block) => {
                block.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn select_edge(&mut self, id: &str, selected: bool) -> bool {
        match self.edges.iter_mut().find(|e| e.id == id) {
            Some(edge) => {
                edge.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.blocks.iter_mut().for_each(|b| b.selected = false);
        self.edges.iter_mut().for_each(|e| e.selected = false);
    }

    pub fn selected_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.selected)
    }

    pub fn selected_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.selected)
    }

    /// Copy of the graph with selection flags cleared.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot {
            blocks: self.blocks.clone(),
            edges: self.edges.clone(),
        };
        snapshot.blocks.iter_mut().for_each(|b| b.selected = false);
        snapshot.edges.iter_mut().for_each(|e| e.selected = false);
        snapshot
    }

    pub fn restore(&mut self, snapshot: GraphSnapshot) {
        self.blocks = snapshot.blocks;
        self.edges = snapshot.edges;
    }

    pub fn into_scenario(self, bot_id: impl Into<String>) -> Scenario {
        let mut scenario = Scenario::empty(bot_id);
        scenario.blocks = self.blocks;
        scenario.edges = self.edges;
        scenario
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.contains_block(&id) && self.edge(&id).is_none() {
                return id;
            }
        }
    }
}
