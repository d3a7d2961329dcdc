use super::content::BlockData;
use super::kind::{BlockDescriptor, BlockKind, ExitLayout, default_descriptors};
use ahash::AHashMap;

/// Color used for blocks whose type the registry does not recognise.
pub const UNKNOWN_BLOCK_COLOR: &str = "#ffffff";

/// Display marker for a block type that is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBlock {
    pub tag: String,
}

impl UnknownBlock {
    pub fn label(&self) -> String {
        if self.tag.is_empty() {
            "Untyped block".to_string()
        } else {
            format!("Unknown block: {}", self.tag)
        }
    }

    pub fn color(&self) -> &'static str {
        UNKNOWN_BLOCK_COLOR
    }
}

/// Result of a registry lookup. Lookups never fail; an unrecognised tag
/// yields an explicit `Unknown` marker instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockLookup<'a> {
    Known(&'a BlockDescriptor),
    Unknown(UnknownBlock),
}

impl BlockLookup<'_> {
    pub fn is_known(&self) -> bool {
        matches!(self, BlockLookup::Known(_))
    }

    pub fn label(&self) -> String {
        match self {
            BlockLookup::Known(descriptor) => descriptor.title.to_string(),
            BlockLookup::Unknown(unknown) => unknown.label(),
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            BlockLookup::Known(descriptor) => descriptor.color,
            BlockLookup::Unknown(unknown) => unknown.color(),
        }
    }

    pub fn exits(&self) -> ExitLayout {
        match self {
            BlockLookup::Known(descriptor) => descriptor.exits,
            BlockLookup::Unknown(_) => ExitLayout::Single,
        }
    }
}

/// Catalog mapping a block-type tag to its default shape.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    descriptors: Vec<BlockDescriptor>,
    tags: AHashMap<String, BlockKind>,
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRegistry {
    pub fn new() -> Self {
        let descriptors = default_descriptors();
        let tags = descriptors
            .iter()
            .map(|d| (d.kind.tag().to_string(), d.kind))
            .collect();
        Self { descriptors, tags }
    }

    /// Accept `alias` as another name for `kind`, e.g. a legacy tag found in
    /// older scenario documents.
    pub fn with_alias(mut self, alias: &str, kind: BlockKind) -> Self {
        self.tags.insert(alias.to_string(), kind);
        self
    }

    pub fn lookup(&self, tag: &str) -> BlockLookup<'_> {
        match self.resolve(tag) {
            Some(kind) => BlockLookup::Known(self.descriptor(kind)),
            None => BlockLookup::Unknown(UnknownBlock {
                tag: tag.to_string(),
            }),
        }
    }

    /// Resolve a tag (or alias) to its kind.
    pub fn resolve(&self, tag: &str) -> Option<BlockKind> {
        self.tags.get(tag).copied()
    }

    pub fn is_known(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn descriptor(&self, kind: BlockKind) -> &BlockDescriptor {
        // The table is generated from `BlockKind::ALL`, so every kind has a row.
        &self.descriptors[kind as usize]
    }

    /// Descriptors in palette order.
    pub fn descriptors(&self) -> &[BlockDescriptor] {
        &self.descriptors
    }

    /// Default label and field shape for a freshly created block.
    pub fn defaults(&self, kind: BlockKind) -> BlockData {
        BlockData::for_kind(kind)
    }
}
