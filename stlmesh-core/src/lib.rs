/// STLMesh Core Library - STL mesh loading
///
/// Reads stereolithography files in either the binary or the ASCII variant
/// into an immutable, shared facet buffer.

pub mod ascii;
pub mod binary;
pub mod config;
pub mod error;
pub mod facet;
pub mod format;
pub mod loader;

// Re-export commonly used types
pub use config::LoadOptions;
pub use error::{Found, LoadError, ParseError};
pub use facet::{Facet, MeshBuffer};
pub use format::Format;
pub use loader::{load, load_bytes, load_bytes_with, load_with, StlModel};
