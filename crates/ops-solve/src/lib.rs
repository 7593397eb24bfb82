//! # ops-solve: Combinatorial Solver Backends
//!
//! Native solvers for the three problem families plus the schedule
//! validator:
//!
//! - [`schedule`] - flexible job-shop scheduling (multi-start serial
//!   schedule generation with combinatorial lower bounds)
//! - [`routing`] - CVRPTW (cheapest-feasible insertion + local search)
//! - [`packing`] - multi-dimensional bin packing (objective-specific
//!   constructive placement + improvement passes)
//! - [`validate`] - constraint checking for candidate schedules
//!
//! Every solver is a pure function of its request, deterministic for a
//! given input (random restarts run from fixed seeds with fixed budgets),
//! and bounded by the request's `max_solve_time_seconds`. Failure is a
//! status in the response, never a panic.

pub mod packing;
pub mod routing;
pub mod schedule;
pub mod validate;

pub use packing::solve_packing;
pub use routing::solve_routing;
pub use schedule::solve_schedule;
pub use validate::validate_schedule;
