//! # Schedule Validator
//!
//! Checks a candidate schedule (manual or solver-produced) against the
//! jobs/machines that define its constraints and reports violations with
//! severity, plus improvement suggestions when the schedule is clean.
//!
//! Every check runs independently so one broken constraint does not mask
//! another. Metrics are computed only when no error-severity violation is
//! present; a schedule that merely misses some defined tasks (warnings)
//! still gets metrics.

use std::collections::HashMap;

use ops_core::schedule::{
    Job, Machine, ScheduledTask, Severity, ValidateRequest, ValidateResponse, ValidationViolation,
};

use crate::schedule::{compute_job_summaries, compute_machine_utilization, compute_metrics};

fn violation(
    violation_type: &str,
    severity: Severity,
    description: String,
    affected: Vec<String>,
) -> ValidationViolation {
    ValidationViolation {
        violation_type: violation_type.to_string(),
        severity,
        description,
        affected_tasks: affected,
    }
}

fn task_ref(st: &ScheduledTask) -> String {
    format!("{}/{}", st.job_id, st.task_id)
}

/// Validate a schedule against jobs/machines constraints.
pub fn validate_schedule(request: &ValidateRequest) -> ValidateResponse {
    let mut violations: Vec<ValidationViolation> = Vec::new();
    let mut suggestions: Vec<String> = Vec::new();

    let job_map: HashMap<&str, &Job> = request.jobs.iter().map(|j| (j.job_id.as_str(), j)).collect();
    let machine_map: HashMap<&str, &Machine> = request
        .machines
        .iter()
        .map(|m| (m.machine_id.as_str(), m))
        .collect();

    let mut task_lookup: HashMap<(&str, &str), &ScheduledTask> = HashMap::new();
    for st in &request.schedule {
        task_lookup.insert((st.job_id.as_str(), st.task_id.as_str()), st);
    }

    // 1. Consistency: start + duration == end.
    for st in &request.schedule {
        if st.start + st.duration != st.end {
            violations.push(violation(
                "consistency",
                Severity::Error,
                format!(
                    "Task {}: start({}) + duration({}) != end({})",
                    task_ref(st),
                    st.start,
                    st.duration,
                    st.end
                ),
                vec![task_ref(st)],
            ));
        }
    }

    // 2. Machine existence.
    for st in &request.schedule {
        if !machine_map.contains_key(st.machine_id.as_str()) {
            violations.push(violation(
                "unknown_machine",
                Severity::Error,
                format!(
                    "Task {} assigned to unknown machine '{}'",
                    task_ref(st),
                    st.machine_id
                ),
                vec![task_ref(st)],
            ));
        }
    }

    // 3. Job/task existence and machine eligibility.
    for st in &request.schedule {
        let Some(job) = job_map.get(st.job_id.as_str()) else {
            violations.push(violation(
                "unknown_job",
                Severity::Error,
                format!("Scheduled task references unknown job '{}'", st.job_id),
                vec![task_ref(st)],
            ));
            continue;
        };
        let Some(task_def) = job.tasks.iter().find(|t| t.task_id == st.task_id) else {
            violations.push(violation(
                "unknown_task",
                Severity::Error,
                format!("Job '{}' has no task '{}'", st.job_id, st.task_id),
                vec![task_ref(st)],
            ));
            continue;
        };
        if !task_def.eligible_machines.contains(&st.machine_id) {
            violations.push(violation(
                "machine_eligibility",
                Severity::Error,
                format!(
                    "Task {} assigned to machine '{}' but eligible machines are {:?}",
                    task_ref(st),
                    st.machine_id,
                    task_def.eligible_machines
                ),
                vec![task_ref(st)],
            ));
        }
    }

    // 4. No-overlap per machine.
    let mut tasks_by_machine: HashMap<&str, Vec<&ScheduledTask>> = HashMap::new();
    for st in &request.schedule {
        tasks_by_machine
            .entry(st.machine_id.as_str())
            .or_default()
            .push(st);
    }
    for (mid, tasks) in &tasks_by_machine {
        let mut sorted = tasks.clone();
        sorted.sort_by_key(|t| t.start);
        for pair in sorted.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.end > b.start {
                violations.push(violation(
                    "overlap",
                    Severity::Error,
                    format!(
                        "Machine '{}': task {} ends at {} but {} starts at {}",
                        mid,
                        task_ref(a),
                        a.end,
                        task_ref(b),
                        b.start
                    ),
                    vec![task_ref(a), task_ref(b)],
                ));
            }
        }
    }

    // 5. Precedence within jobs.
    for job in &request.jobs {
        for pair in job.tasks.windows(2) {
            let st1 = task_lookup.get(&(job.job_id.as_str(), pair[0].task_id.as_str()));
            let st2 = task_lookup.get(&(job.job_id.as_str(), pair[1].task_id.as_str()));
            if let (Some(st1), Some(st2)) = (st1, st2) {
                if st2.start < st1.end {
                    violations.push(violation(
                        "precedence",
                        Severity::Error,
                        format!(
                            "Job '{}': task '{}' starts at {} before predecessor '{}' ends at {}",
                            job.job_id, pair[1].task_id, st2.start, pair[0].task_id, st1.end
                        ),
                        vec![task_ref(st1), task_ref(st2)],
                    ));
                }
            }
        }
    }

    // 6. Job time windows.
    for job in &request.jobs {
        let Some(tw) = &job.time_window else { continue };
        let first = job.tasks.first().map(|t| t.task_id.as_str());
        let last = job.tasks.last().map(|t| t.task_id.as_str());
        if let Some(first_id) = first {
            if let Some(st) = task_lookup.get(&(job.job_id.as_str(), first_id)) {
                if tw.earliest_start > 0 && st.start < tw.earliest_start {
                    violations.push(violation(
                        "time_window",
                        Severity::Error,
                        format!(
                            "Job '{}' starts at {} before earliest_start {}",
                            job.job_id, st.start, tw.earliest_start
                        ),
                        vec![task_ref(st)],
                    ));
                }
            }
        }
        if let (Some(last_id), Some(latest)) = (last, tw.latest_end) {
            if let Some(st) = task_lookup.get(&(job.job_id.as_str(), last_id)) {
                if st.end > latest {
                    violations.push(violation(
                        "time_window",
                        Severity::Error,
                        format!(
                            "Job '{}' ends at {} after latest_end {}",
                            job.job_id, st.end, latest
                        ),
                        vec![task_ref(st)],
                    ));
                }
            }
        }
    }

    // 7. Machine availability.
    for st in &request.schedule {
        let Some(m) = machine_map.get(st.machine_id.as_str()) else {
            continue;
        };
        if st.start < m.availability_start {
            violations.push(violation(
                "machine_availability",
                Severity::Error,
                format!(
                    "Task {} starts at {} before machine '{}' is available at {}",
                    task_ref(st),
                    st.start,
                    m.machine_id,
                    m.availability_start
                ),
                vec![task_ref(st)],
            ));
        }
        if let Some(avail_end) = m.availability_end {
            if st.end > avail_end {
                violations.push(violation(
                    "machine_availability",
                    Severity::Error,
                    format!(
                        "Task {} ends at {} after machine '{}' availability ends at {}",
                        task_ref(st),
                        st.end,
                        m.machine_id,
                        avail_end
                    ),
                    vec![task_ref(st)],
                ));
            }
        }
    }

    // 8. Missing tasks (warnings only).
    for job in &request.jobs {
        for task in &job.tasks {
            if !task_lookup.contains_key(&(job.job_id.as_str(), task.task_id.as_str())) {
                violations.push(violation(
                    "missing_task",
                    Severity::Warning,
                    format!("Task {}/{} is not in the schedule", job.job_id, task.task_id),
                    vec![format!("{}/{}", job.job_id, task.task_id)],
                ));
            }
        }
    }

    let has_errors = violations.iter().any(|v| v.severity == Severity::Error);

    let metrics = if !has_errors {
        let job_summaries = compute_job_summaries(&request.jobs, &request.schedule);
        let total_span = request.schedule.iter().map(|st| st.end).max().unwrap_or(0);
        let machine_utils =
            compute_machine_utilization(&request.machines, &request.schedule, total_span);
        Some(compute_metrics(&job_summaries, &machine_utils, 0.0))
    } else {
        None
    };

    if violations.is_empty() {
        // Idle-gap compaction hints.
        for (mid, tasks) in &tasks_by_machine {
            let mut sorted = tasks.clone();
            sorted.sort_by_key(|t| t.start);
            let total_idle: i64 = sorted
                .windows(2)
                .map(|pair| (pair[1].start - pair[0].end).max(0))
                .sum();
            if total_idle > 0 && sorted.len() > 1 {
                suggestions.push(format!(
                    "Machine '{}' has {} time units of idle gaps between tasks. Consider compacting.",
                    mid, total_idle
                ));
            }
        }

        // Load imbalance.
        if !tasks_by_machine.is_empty() {
            let loads: Vec<i64> = tasks_by_machine
                .values()
                .map(|ts| ts.iter().map(|t| t.duration).sum())
                .collect();
            let max_load = loads.iter().copied().max().unwrap_or(0);
            let min_load = if loads.len() > 1 {
                loads.iter().copied().min().unwrap_or(0)
            } else {
                max_load
            };
            if max_load > 0 && (min_load as f64 / max_load as f64) < 0.5 {
                suggestions.push(format!(
                    "Load imbalance detected: busiest machine has {} time units, lightest has {}. \
                     Consider rebalancing.",
                    max_load, min_load
                ));
            }
        }

        // Late jobs.
        for job in &request.jobs {
            let Some(due) = job.due_date else { continue };
            let Some(last) = job.tasks.last() else { continue };
            if let Some(st) = task_lookup.get(&(job.job_id.as_str(), last.task_id.as_str())) {
                if st.end > due {
                    suggestions.push(format!(
                        "Job '{}' is {} time units late (due: {}, ends: {}).",
                        job.job_id,
                        st.end - due,
                        due,
                        st.end
                    ));
                }
            }
        }
    }

    ValidateResponse {
        is_valid: !has_errors,
        num_violations: violations.len(),
        violations,
        metrics,
        improvement_suggestions: suggestions,
    }
}
