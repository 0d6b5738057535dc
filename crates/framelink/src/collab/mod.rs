//! File-backed collaborators for the CLI sessions.

pub mod disk;
pub mod source;

pub use disk::DiskSink;
pub use source::FileSource;
