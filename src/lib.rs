//! Ambar - static scanner for energy-hungry C++ anti-patterns
//!
//! The library half holds the scanning core, which never touches the
//! filesystem, plus the report model and renderers. The `ambar` binary
//! wires them to a directory walk and a progress bar.
//!
//! ```no_run
//! use ambar::scanner::{PatternCatalog, RuleOverrides, ScanEngine};
//!
//! let engine = ScanEngine::new(PatternCatalog::builtin(), RuleOverrides::default());
//! let report = engine.scan_text("demo.cpp", "int* p = new int(3);\n").unwrap();
//! assert_eq!(report.findings.len(), 1);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod reporters;
pub mod scanner;
