// Paper filtering: semantic topic matching and fuzzy author matching.
//
// names -> authors, embeddings -> topics, and engine composes both over a
// batch of papers.

pub mod authors;
pub mod embeddings;
pub mod engine;
pub mod model;
pub mod names;
pub mod topics;

pub use engine::{filter, FilterVerdict, PaperFilter};
