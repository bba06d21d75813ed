//! Build-and-run orchestration for `#!`-launched C++ programs.
//!
//! Given a source file whose first line is a `#!` launcher directive, the
//! [`Orchestrator`] derives where its compiled binary lives, decides whether
//! that binary is stale, strips the directive and recompiles under a
//! per-artifact lock when it is, and finally runs the binary.

#![warn(missing_docs)]

pub mod artifact;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod strip;
pub mod toolchain;

pub use artifact::{ArtifactPaths, Layout};
pub use error::BuildError;
pub use lock::RebuildLock;
pub use orchestrator::{
    BuildOptions, Handoff, Orchestrator, Prepared, RebuildDecision, RebuildReason, Stage,
};
pub use strip::write_stripped_copy;
pub use toolchain::{BuildProfile, CompileOutcome, CompileRequest, SystemToolchain, Toolchain};
