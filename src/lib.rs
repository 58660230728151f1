//! Drive the ngspice shared library from Rust.
//!
//! ```no_run
//! use ohmlink::Engine;
//!
//! let engine = Engine::new()?;
//! let results = engine.simulate(vec![
//!     "divider",
//!     "v1 1 0 dc 1",
//!     "r1 1 2 50",
//!     "r2 2 0 50",
//!     ".op",
//!     ".end",
//! ])?;
//! let v2 = results.data["op1"].real("2").unwrap()[0];
//! assert!((v2 - 0.5).abs() < 1e-9);
//! # Ok::<(), ohmlink::OhmlinkError>(())
//! ```

pub mod config;
pub mod decode;
pub mod dispatch;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod native;
pub mod output;
pub mod results;
pub mod sources;
pub mod stats;
pub mod units;
pub mod version;

pub use engine::{Engine, EngineOptions, Netlist};
pub use error::{OhmlinkError, Result};
pub use results::{Dataset, Plot, Results, SkippedVector, VectorData};
pub use units::VectorType;
pub use version::EngineVersion;
