//! Data model for the flexible job-shop scheduling family.
//!
//! A request is a set of jobs (each an ordered task chain) and machines; the
//! solver assigns every task to an eligible machine and picks start times
//! that respect precedence, machine availability, and job time windows.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{OpsError, OpsResult, SolverStatus};

/// What the schedule solver should optimize for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveType {
    MinimizeMakespan,
    /// Priority-weighted sum of job tardiness. Falls back to makespan when
    /// no job carries a due date.
    MinimizeTotalTardiness,
    MinimizeMaxTardiness,
    /// Sum of job completion times.
    MinimizeTotalCompletionTime,
    /// Minimize the maximum per-machine assigned load.
    BalanceLoad,
}

impl Default for ObjectiveType {
    fn default() -> Self {
        ObjectiveType::MinimizeMakespan
    }
}

/// A time window constraint (earliest start, latest end).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default)]
    pub earliest_start: i64,
    /// None = no deadline.
    pub latest_end: Option<i64>,
}

/// A single task (operation) within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique within the owning job.
    pub task_id: String,
    /// Processing time in time units.
    pub duration: i64,
    /// Machine ids that can process this task; duplicates are ignored.
    pub eligible_machines: Vec<String>,
    /// Setup time charged before the task on any machine.
    #[serde(default)]
    pub setup_time: i64,
}

/// A job consisting of ordered tasks that execute sequentially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub name: Option<String>,
    pub tasks: Vec<Task>,
    /// 1 = lowest, 10 = highest. Weights tardiness objectives.
    #[serde(default = "default_priority")]
    pub priority: i64,
    pub due_date: Option<i64>,
    pub time_window: Option<TimeWindow>,
}

fn default_priority() -> i64 {
    1
}

/// A machine / resource that processes tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub availability_start: i64,
    /// None = always available.
    pub availability_end: Option<i64>,
}

/// Complete scheduling request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub jobs: Vec<Job>,
    pub machines: Vec<Machine>,
    #[serde(default)]
    pub objective: ObjectiveType,
    #[serde(default = "default_solve_time")]
    pub max_solve_time_seconds: i64,
}

pub(crate) fn default_solve_time() -> i64 {
    30
}

impl ScheduleRequest {
    /// Schema-level validation: id uniqueness and range bounds. Anything
    /// caught here is a 422-class failure, not a solver outcome.
    pub fn validate(&self) -> OpsResult<()> {
        if self.jobs.is_empty() || self.jobs.len() > 500 {
            return Err(OpsError::Validation(format!(
                "jobs must contain 1..=500 entries, got {}",
                self.jobs.len()
            )));
        }
        if self.machines.is_empty() || self.machines.len() > 100 {
            return Err(OpsError::Validation(format!(
                "machines must contain 1..=100 entries, got {}",
                self.machines.len()
            )));
        }
        if !(1..=300).contains(&self.max_solve_time_seconds) {
            return Err(OpsError::Validation(format!(
                "max_solve_time_seconds must be in 1..=300, got {}",
                self.max_solve_time_seconds
            )));
        }
        let mut job_ids = HashSet::new();
        for job in &self.jobs {
            if !job_ids.insert(job.job_id.as_str()) {
                return Err(OpsError::Validation(format!(
                    "duplicate job_id '{}'",
                    job.job_id
                )));
            }
            if job.tasks.is_empty() {
                return Err(OpsError::Validation(format!(
                    "job '{}' has no tasks",
                    job.job_id
                )));
            }
            if !(1..=10).contains(&job.priority) {
                return Err(OpsError::Validation(format!(
                    "job '{}' priority must be in 1..=10, got {}",
                    job.job_id, job.priority
                )));
            }
            if matches!(job.due_date, Some(d) if d < 0) {
                return Err(OpsError::Validation(format!(
                    "job '{}' due_date must be >= 0",
                    job.job_id
                )));
            }
            if let Some(tw) = &job.time_window {
                if tw.earliest_start < 0 || matches!(tw.latest_end, Some(e) if e < 0) {
                    return Err(OpsError::Validation(format!(
                        "job '{}' time window bounds must be >= 0",
                        job.job_id
                    )));
                }
            }
            let mut task_ids = HashSet::new();
            for task in &job.tasks {
                if !task_ids.insert(task.task_id.as_str()) {
                    return Err(OpsError::Validation(format!(
                        "duplicate task_id '{}' in job '{}'",
                        task.task_id, job.job_id
                    )));
                }
                if task.duration <= 0 {
                    return Err(OpsError::Validation(format!(
                        "task '{}/{}' duration must be > 0",
                        job.job_id, task.task_id
                    )));
                }
                if task.setup_time < 0 {
                    return Err(OpsError::Validation(format!(
                        "task '{}/{}' setup_time must be >= 0",
                        job.job_id, task.task_id
                    )));
                }
                if task.eligible_machines.is_empty() {
                    return Err(OpsError::Validation(format!(
                        "task '{}/{}' has no eligible machines",
                        job.job_id, task.task_id
                    )));
                }
            }
        }
        let mut machine_ids = HashSet::new();
        for m in &self.machines {
            if !machine_ids.insert(m.machine_id.as_str()) {
                return Err(OpsError::Validation(format!(
                    "duplicate machine_id '{}'",
                    m.machine_id
                )));
            }
            if m.availability_start < 0 {
                return Err(OpsError::Validation(format!(
                    "machine '{}' availability_start must be >= 0",
                    m.machine_id
                )));
            }
        }
        Ok(())
    }
}

/// A task assigned to a machine with start/end times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub job_id: String,
    pub task_id: String,
    pub machine_id: String,
    pub start: i64,
    pub end: i64,
    /// Processing plus setup time.
    pub duration: i64,
}

/// Summary metrics for a single job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub name: Option<String>,
    pub start: i64,
    pub end: i64,
    /// First task start to last task end.
    pub makespan: i64,
    /// Time past due date; 0 when on time or undated.
    pub tardiness: i64,
    pub on_time: bool,
}

/// Utilization metrics for a single machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineUtilization {
    pub machine_id: String,
    pub name: Option<String>,
    pub busy_time: i64,
    pub idle_time: i64,
    pub utilization_pct: f64,
    pub num_tasks: usize,
}

/// Aggregate metrics for the entire schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleMetrics {
    pub makespan: i64,
    pub total_tardiness: i64,
    pub max_tardiness: i64,
    pub num_on_time: usize,
    pub num_late: usize,
    /// Sum of job completion times.
    pub total_completion_time: i64,
    pub avg_machine_utilization_pct: f64,
    pub solve_time_seconds: f64,
}

/// A single entry for Gantt chart rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttEntry {
    pub job_id: String,
    pub task_id: String,
    pub machine_id: String,
    pub start: i64,
    pub end: i64,
    pub label: String,
}

/// Complete solver response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub status: SolverStatus,
    pub message: String,
    #[serde(default)]
    pub schedule: Vec<ScheduledTask>,
    #[serde(default)]
    pub job_summaries: Vec<JobSummary>,
    #[serde(default)]
    pub machine_utilization: Vec<MachineUtilization>,
    pub metrics: Option<ScheduleMetrics>,
    #[serde(default)]
    pub gantt: Vec<GanttEntry>,
}

impl ScheduleResponse {
    /// Terminal response with no schedule attached.
    pub fn failed(status: SolverStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            schedule: Vec::new(),
            job_summaries: Vec::new(),
            machine_utilization: Vec::new(),
            metrics: None,
            gantt: Vec::new(),
        }
    }
}

/// Severity of a validation violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single constraint violation found in a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    /// overlap, precedence, machine_eligibility, time_window, ...
    pub violation_type: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub affected_tasks: Vec<String>,
}

/// Validate an existing schedule against constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub schedule: Vec<ScheduledTask>,
    pub jobs: Vec<Job>,
    pub machines: Vec<Machine>,
}

impl ValidateRequest {
    pub fn validate(&self) -> OpsResult<()> {
        if self.schedule.is_empty() {
            return Err(OpsError::Validation("schedule must not be empty".into()));
        }
        if self.jobs.is_empty() || self.machines.is_empty() {
            return Err(OpsError::Validation(
                "jobs and machines must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Validation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub is_valid: bool,
    pub num_violations: usize,
    #[serde(default)]
    pub violations: Vec<ValidationViolation>,
    pub metrics: Option<ScheduleMetrics>,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
}
