//! # ops-core: Operations Intelligence Data Model
//!
//! Shared foundation for the optimization engine: typed request/response
//! models for the three problem families, the unified error type, the
//! parameter-path resolver that lets meta-engines mutate request documents
//! generically, and the scalar statistics used by risk analysis.
//!
//! ## Problem families
//!
//! - [`schedule`] - flexible job-shop scheduling (jobs, tasks, machines)
//! - [`routing`] - capacitated vehicle routing with time windows
//! - [`packing`] - multi-dimensional bin packing
//!
//! Every request type carries a `validate()` method enforcing the schema
//! bounds (unique ids, ranges, cross-field rules); validation failures are
//! [`OpsError::Validation`] and never reach a solver.
//!
//! ## Parameter paths
//!
//! [`path`] implements dotted `field[id].field` expressions over untyped
//! `serde_json::Value` documents. This is the seam that keeps the
//! uncertainty engines generic: they perturb scalars by path instead of
//! knowing each request type.

pub mod error;
pub mod packing;
pub mod path;
pub mod routing;
pub mod schedule;
pub mod stats;
pub mod status;

pub use error::{OpsError, OpsResult};
pub use status::SolverStatus;
