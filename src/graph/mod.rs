//! The scenario graph: blocks, the edges between them, and the store that
//! mutates both without ever leaving an edge dangling.

pub mod model;
pub mod store;

pub use model::*;
pub use store::GraphStore;
