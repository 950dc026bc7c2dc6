/// Article files keyed by slug.
pub mod directory;
/// YAML frontmatter parsing and rendering.
pub mod frontmatter;

pub use directory::{CreateError, Directory, Listing, LoadError};
pub use frontmatter::ParseError;
