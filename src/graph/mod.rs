//! Dependency graph core: the file-node arena and the analysis session.

pub mod node;
pub mod session;

pub use node::{FileId, FileNode, GroupId, LinkGroup, ParseState};
pub use session::Session;
