//! Run-loop plumbing for the `swarmtree` binary: logs, timing sections and
//! the iteration loop around the engine.

pub mod logging;
pub mod run;
pub mod timing;

pub use logging::RunLog;
pub use run::{RunOptions, format_parent_chain, load_config, run};
pub use timing::{Section, SectionId, Sections};
