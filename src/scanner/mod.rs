//! The scanning core
//!
//! ```text
//! raw text ─► normalizer ─► normalized lines ─► engine ─► findings ─► report
//!                                                 │  ▲
//!                                          catalog┘  └ scope tracker
//! ```
//!
//! Nothing in here touches the filesystem. The CLI reads files and hands
//! their bytes to [`batch::scan_batch`] or [`engine::ScanEngine`].

pub mod batch;
pub mod catalog;
pub mod engine;
pub mod normalizer;
pub mod scope;

pub use batch::{scan_batch, CancellationToken, ProgressCallback, SourceInput};
pub use catalog::{PatternCatalog, Rule};
pub use engine::{RuleOverrides, ScanEngine};
