//! # cppdeps
//!
//! Dependency analysis for C/C++ source trees. The library scans a tree for
//! `#include` directives, resolves them against configurable search paths,
//! and derives both compile-time and link-time dependency closures, which
//! the driver renders as Makefile-compatible rules or as whole-graph
//! link-dependency reports.
//!
//! The typical entry point is [`Driver`]: build a [`Config`], hand it the
//! tree roots, and write the output anywhere `io::Write` goes.
//!
//! ```no_run
//! use cppdeps::{Config, Driver};
//!
//! let mut config = Config::new();
//! config.user_ipath.push("src".into());
//! config.strip_prefix = "src".into();
//! config.finalize();
//!
//! let mut driver = Driver::new(config, vec!["src".into()]);
//! let mut out = Vec::new();
//! driver.run(&mut out)?;
//! # Ok::<(), cppdeps::Error>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod format;
pub mod graph;
pub mod paths;
pub mod report;
pub mod resolve;
pub mod scan;

pub use config::{expand_options_files, Config, OutputMode, Verbosity};
pub use driver::Driver;
pub use error::{Error, Result};
pub use graph::{FileId, GroupId, Session};
