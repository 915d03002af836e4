//! Directory tree of a namespace: path resolution, the sorted index and rendering.

pub mod index;
pub mod node;
pub mod path;
pub mod render;

pub use index::DirectoryIndex;
pub use node::DirectoryNode;
pub use path::{resolve_relative, AbsolutePath};
pub use render::{render_tree, RenderOptions};
