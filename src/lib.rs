//! Path-addressable context tree.
//!
//! A [`Tree`] holds an arbitrarily nested composition of keyed mappings and
//! ordered sequences, accessed and mutated through dotted path strings
//! instead of manual traversal. Writes autovivify missing structure,
//! key enumeration flattens the tree into sorted leaf paths, and the
//! expansion engine turns descriptor nodes (`__choices__`/`__range__`) into
//! the cartesian product of concrete trees.
//!
//! ```
//! use rsctx::Tree;
//!
//! let mut tree = Tree::new();
//! tree.set("servers.0.host", "alpha.example.com")?;
//! tree.set("servers.0.port", 8080_i64)?;
//! tree.set("servers.1.host", "beta.example.com")?;
//!
//! assert_eq!(
//!     tree.keys(),
//!     vec!["servers.0.host", "servers.0.port", "servers.1.host"]
//! );
//! assert_eq!(tree.get("servers.0.port")?.as_i64(), Some(8080));
//! # Ok::<(), rsctx::TreeError>(())
//! ```

pub mod errors;
pub mod expand;
pub mod node;
pub mod path;
pub mod tree;
pub mod util;

pub use errors::{TreeError, TreeResult};
pub use expand::Expansion;
pub use node::{Map, Node, Resolve};
pub use path::Segment;
pub use tree::{DumpOptions, MapCtor, Tree};
