//! The block catalog: which block types exist, what they look like in the
//! palette, and what fields each one carries.

pub mod content;
pub mod kind;
pub mod registry;

pub use content::*;
pub use kind::*;
pub use registry::*;
