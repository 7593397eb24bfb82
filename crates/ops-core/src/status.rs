//! Solver outcome classification shared by all three problem families.

use serde::{Deserialize, Serialize};

/// Outcome of a single solve.
///
/// `Optimal` and `Feasible` both carry a usable solution; the remaining
/// variants describe why none is available. Meta-engines treat
/// `is_feasible()` as the single feasibility predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// Solution found and proven optimal (bound met or search exhausted).
    Optimal,
    /// Solution found without an optimality proof.
    Feasible,
    /// Proven that no solution exists under the given constraints.
    Infeasible,
    /// No solution found and no proof of infeasibility.
    NoSolution,
    /// Time budget exhausted before any solution was found.
    Timeout,
    /// The model could not be built (unknown references, bad input).
    Error,
}

impl SolverStatus {
    /// Whether this status carries a usable solution.
    pub fn is_feasible(self) -> bool {
        matches!(self, SolverStatus::Optimal | SolverStatus::Feasible)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SolverStatus::Optimal => "optimal",
            SolverStatus::Feasible => "feasible",
            SolverStatus::Infeasible => "infeasible",
            SolverStatus::NoSolution => "no_solution",
            SolverStatus::Timeout => "timeout",
            SolverStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feasibility_predicate() {
        assert!(SolverStatus::Optimal.is_feasible());
        assert!(SolverStatus::Feasible.is_feasible());
        assert!(!SolverStatus::Infeasible.is_feasible());
        assert!(!SolverStatus::Timeout.is_feasible());
        assert!(!SolverStatus::NoSolution.is_feasible());
        assert!(!SolverStatus::Error.is_feasible());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&SolverStatus::NoSolution).unwrap();
        assert_eq!(json, "\"no_solution\"");
        let back: SolverStatus = serde_json::from_str("\"timeout\"").unwrap();
        assert_eq!(back, SolverStatus::Timeout);
    }
}
