//! # Flexible Job-Shop Schedule Solver
//!
//! Assigns every task to one of its eligible machines and picks integer
//! start times subject to:
//!
//! - precedence: tasks within a job run in declared order,
//! - no-overlap: a machine processes one task at a time,
//! - machine availability windows,
//! - job time windows (earliest start of the first task, latest end of the
//!   last task).
//!
//! ## Search
//!
//! The solver is a multi-start serial schedule generator. One pass walks
//! the task set in priority order: at each step the next unscheduled task
//! of some job is selected by a dispatch rule and placed on the eligible
//! machine with the earliest feasible completion (gap-aware, so a task may
//! slot into idle time between earlier placements). Deterministic dispatch
//! rules run first (most-work-remaining, priority, due date, SPT, LPT),
//! then seeded random priority perturbations refine the incumbent. The
//! restart budget is a fixed count, so identical requests produce identical
//! schedules; the wall-clock limit only aborts early with the best found
//! so far.
//!
//! ## Optimality and infeasibility
//!
//! Two combinatorial lower bounds certify optimality when met:
//!
//! - job-chain bound: release time plus total chain length per job,
//! - machine bound: for each machine, the earliest head among tasks that
//!   can only run there plus their total load.
//!
//! Infeasibility is reported only when proven structurally (a job chain
//! that cannot fit its time window, or a task that fits no eligible
//! machine's availability window); everything else that fails to produce a
//! schedule is a timeout.

use std::collections::HashMap;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use ops_core::schedule::{
    GanttEntry, JobSummary, MachineUtilization, ObjectiveType, ScheduleMetrics, ScheduleRequest,
    ScheduleResponse, ScheduledTask,
};
use ops_core::stats::{round1, round3};
use ops_core::SolverStatus;

/// Fixed restart budget; keeps the search deterministic for a given request.
const RANDOM_RESTARTS: usize = 160;
/// Seed for the restart perturbation stream.
const SEARCH_SEED: u64 = 42;

struct TaskInst {
    task_id: String,
    /// Processing plus setup time.
    duration: i64,
    /// Indices into the machine list, deduplicated.
    eligible: Vec<usize>,
}

struct JobInst {
    job_id: String,
    name: Option<String>,
    priority: i64,
    due_date: Option<i64>,
    earliest_start: i64,
    latest_end: Option<i64>,
    tasks: Vec<TaskInst>,
}

struct MachineInst {
    machine_id: String,
    name: Option<String>,
    avail_start: i64,
    avail_end: Option<i64>,
}

struct Instance {
    jobs: Vec<JobInst>,
    machines: Vec<MachineInst>,
}

impl Instance {
    fn total_tasks(&self) -> usize {
        self.jobs.iter().map(|j| j.tasks.len()).sum()
    }
}

#[derive(Clone)]
struct Placement {
    job: usize,
    task: usize,
    machine: usize,
    start: i64,
    end: i64,
}

/// Lexicographic objective score: `primary` is the value being minimized,
/// `secondary` breaks ties (only balance_load uses it).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    primary: i64,
    secondary: i64,
}

#[derive(Clone, Copy)]
enum Rule {
    MostWorkRemaining,
    HighestPriority,
    EarliestDue,
    ShortestTask,
    LongestTask,
}

const RULES: [Rule; 5] = [
    Rule::MostWorkRemaining,
    Rule::HighestPriority,
    Rule::EarliestDue,
    Rule::ShortestTask,
    Rule::LongestTask,
];

/// Solve a flexible job-shop scheduling problem.
pub fn solve_schedule(request: &ScheduleRequest) -> ScheduleResponse {
    let t0 = Instant::now();

    let machine_index: HashMap<&str, usize> = request
        .machines
        .iter()
        .enumerate()
        .map(|(i, m)| (m.machine_id.as_str(), i))
        .collect();

    // Unknown machine references are a model error, not infeasibility.
    for job in &request.jobs {
        for task in &job.tasks {
            for mid in &task.eligible_machines {
                if !machine_index.contains_key(mid.as_str()) {
                    return ScheduleResponse::failed(
                        SolverStatus::Error,
                        format!(
                            "Task {}/{} references unknown machine '{}'",
                            job.job_id, task.task_id, mid
                        ),
                    );
                }
            }
        }
    }

    let instance = build_instance(request, &machine_index);

    if let Some(reason) = prove_infeasible(&instance) {
        return ScheduleResponse::failed(SolverStatus::Infeasible, reason);
    }

    let deadline = t0 + std::time::Duration::from_secs(request.max_solve_time_seconds.max(1) as u64);
    let bound = lower_bound(&instance, request.objective);

    let mut best: Option<(Score, Vec<Placement>)> = None;
    let mut proven_optimal = false;

    for rule in RULES {
        if let Some(placed) = construct(&instance, Selector::Rule(rule)) {
            let s = score(&instance, &placed, request.objective);
            if best.as_ref().map_or(true, |(b, _)| s < *b) {
                best = Some((s, placed));
            }
        }
        if let Some((s, _)) = &best {
            if s.primary <= bound {
                proven_optimal = true;
                break;
            }
        }
        if Instant::now() >= deadline {
            break;
        }
    }

    if !proven_optimal && Instant::now() < deadline {
        let mut rng = ChaCha8Rng::seed_from_u64(SEARCH_SEED);
        let n = instance.total_tasks();
        for restart in 0..RANDOM_RESTARTS {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut rng);
            if let Some(placed) = construct(&instance, Selector::Keys(&order)) {
                let s = score(&instance, &placed, request.objective);
                if best.as_ref().map_or(true, |(b, _)| s < *b) {
                    best = Some((s, placed));
                }
            }
            if let Some((s, _)) = &best {
                if s.primary <= bound {
                    proven_optimal = true;
                    break;
                }
            }
            if restart % 8 == 7 && Instant::now() >= deadline {
                break;
            }
        }
    }

    let solve_time = t0.elapsed().as_secs_f64();

    let (score_best, placed) = match best {
        Some(pair) => pair,
        None => {
            return ScheduleResponse::failed(
                SolverStatus::Timeout,
                format!(
                    "Solver timed out after {}s without finding a schedule. \
                     Try increasing max_solve_time_seconds or relaxing time windows.",
                    request.max_solve_time_seconds
                ),
            );
        }
    };

    debug!(
        objective = ?request.objective,
        score = score_best.primary,
        bound,
        optimal = proven_optimal,
        "schedule search finished"
    );

    let status = if proven_optimal {
        SolverStatus::Optimal
    } else {
        SolverStatus::Feasible
    };

    extract_response(request, &instance, &placed, status, solve_time)
}

fn build_instance(request: &ScheduleRequest, machine_index: &HashMap<&str, usize>) -> Instance {
    let machines = request
        .machines
        .iter()
        .map(|m| MachineInst {
            machine_id: m.machine_id.clone(),
            name: m.name.clone(),
            avail_start: m.availability_start,
            avail_end: m.availability_end,
        })
        .collect();

    let jobs = request
        .jobs
        .iter()
        .map(|job| JobInst {
            job_id: job.job_id.clone(),
            name: job.name.clone(),
            priority: job.priority,
            due_date: job.due_date,
            earliest_start: job
                .time_window
                .as_ref()
                .map(|tw| tw.earliest_start)
                .unwrap_or(0),
            latest_end: job.time_window.as_ref().and_then(|tw| tw.latest_end),
            tasks: job
                .tasks
                .iter()
                .map(|task| {
                    let mut eligible: Vec<usize> = task
                        .eligible_machines
                        .iter()
                        .map(|mid| machine_index[mid.as_str()])
                        .collect();
                    eligible.sort_unstable();
                    eligible.dedup();
                    TaskInst {
                        task_id: task.task_id.clone(),
                        duration: task.duration + task.setup_time,
                        eligible,
                    }
                })
                .collect(),
        })
        .collect();

    Instance { jobs, machines }
}

/// Structural infeasibility proofs. Returns a reason when the instance
/// cannot admit any schedule.
fn prove_infeasible(instance: &Instance) -> Option<String> {
    for job in &instance.jobs {
        let chain: i64 = job.tasks.iter().map(|t| t.duration).sum();
        if let Some(latest) = job.latest_end {
            if job.earliest_start + chain > latest {
                return Some(format!(
                    "No feasible schedule exists: job '{}' needs {} time units but its \
                     time window [{}, {}] only spans {}.",
                    job.job_id,
                    chain,
                    job.earliest_start,
                    latest,
                    latest - job.earliest_start
                ));
            }
        }
        let mut head = job.earliest_start;
        for task in &job.tasks {
            let fits_somewhere = task.eligible.iter().any(|&m| {
                let machine = &instance.machines[m];
                let start = head.max(machine.avail_start);
                match machine.avail_end {
                    Some(end) => start + task.duration <= end,
                    None => true,
                }
            });
            if !fits_somewhere {
                return Some(format!(
                    "No feasible schedule exists: task '{}/{}' ({} time units) fits no \
                     eligible machine's availability window.",
                    job.job_id, task.task_id, task.duration
                ));
            }
            head += task.duration;
        }
    }
    None
}

/// Lower bound on the primary score; meeting it proves optimality.
fn lower_bound(instance: &Instance, objective: ObjectiveType) -> i64 {
    let chain_bound = |job: &JobInst| -> i64 {
        job.earliest_start + job.tasks.iter().map(|t| t.duration).sum::<i64>()
    };

    // Machine bound over tasks with a single eligible machine: the earliest
    // head (release + preceding chain) plus the machine's total locked load.
    let mut machine_load = vec![0_i64; instance.machines.len()];
    let mut machine_head = vec![i64::MAX; instance.machines.len()];
    for job in &instance.jobs {
        let mut head = job.earliest_start;
        for task in &job.tasks {
            if task.eligible.len() == 1 {
                let m = task.eligible[0];
                machine_load[m] += task.duration;
                machine_head[m] =
                    machine_head[m].min(head.max(instance.machines[m].avail_start));
            }
            head += task.duration;
        }
    }
    let makespan_bound = instance
        .jobs
        .iter()
        .map(chain_bound)
        .chain((0..instance.machines.len()).filter_map(|m| {
            (machine_load[m] > 0).then(|| machine_head[m] + machine_load[m])
        }))
        .max()
        .unwrap_or(0);

    match objective {
        ObjectiveType::MinimizeMakespan => makespan_bound,
        ObjectiveType::MinimizeTotalCompletionTime => {
            instance.jobs.iter().map(chain_bound).sum()
        }
        ObjectiveType::MinimizeTotalTardiness | ObjectiveType::MinimizeMaxTardiness => {
            if instance.jobs.iter().any(|j| j.due_date.is_some()) {
                0
            } else {
                makespan_bound
            }
        }
        ObjectiveType::BalanceLoad => {
            let total: i64 = instance
                .jobs
                .iter()
                .flat_map(|j| j.tasks.iter())
                .map(|t| t.duration)
                .sum();
            let even = (total + instance.machines.len() as i64 - 1) / instance.machines.len() as i64;
            machine_load.iter().copied().max().unwrap_or(0).max(even)
        }
    }
}

enum Selector<'a> {
    Rule(Rule),
    /// Priority key per flat task index (job-major); lower is scheduled first.
    Keys(&'a [usize]),
}

/// Earliest start >= `lo` where `dur` units fit around the busy intervals
/// (sorted, disjoint) and before `hi` when bounded.
fn earliest_slot(busy: &[(i64, i64)], lo: i64, dur: i64, hi: Option<i64>) -> Option<i64> {
    let mut start = lo;
    for &(s, e) in busy {
        if start + dur <= s {
            break;
        }
        if e > start {
            start = e;
        }
    }
    match hi {
        Some(h) if start + dur > h => None,
        _ => Some(start),
    }
}

fn construct(instance: &Instance, selector: Selector<'_>) -> Option<Vec<Placement>> {
    let n_jobs = instance.jobs.len();
    let total = instance.total_tasks();

    // Flat index base per job, for the Keys selector.
    let mut base = vec![0_usize; n_jobs];
    let mut acc = 0;
    for (j, job) in instance.jobs.iter().enumerate() {
        base[j] = acc;
        acc += job.tasks.len();
    }

    let mut next_task = vec![0_usize; n_jobs];
    let mut job_ready = vec![0_i64; n_jobs];
    let mut remaining: Vec<i64> = instance
        .jobs
        .iter()
        .map(|j| j.tasks.iter().map(|t| t.duration).sum())
        .collect();
    for (j, job) in instance.jobs.iter().enumerate() {
        job_ready[j] = job.earliest_start;
    }

    let mut busy: Vec<Vec<(i64, i64)>> = vec![Vec::new(); instance.machines.len()];
    let mut placed = Vec::with_capacity(total);

    for _ in 0..total {
        // Candidate set: the next unscheduled task of every job.
        let mut chosen: Option<usize> = None;
        let mut chosen_key = (i64::MAX, usize::MAX);
        for j in 0..n_jobs {
            let t = next_task[j];
            if t >= instance.jobs[j].tasks.len() {
                continue;
            }
            let task = &instance.jobs[j].tasks[t];
            let key = match &selector {
                Selector::Rule(Rule::MostWorkRemaining) => -remaining[j],
                Selector::Rule(Rule::HighestPriority) => {
                    -(instance.jobs[j].priority * 1_000_000 + remaining[j])
                }
                Selector::Rule(Rule::EarliestDue) => {
                    instance.jobs[j].due_date.unwrap_or(i64::MAX)
                }
                Selector::Rule(Rule::ShortestTask) => task.duration,
                Selector::Rule(Rule::LongestTask) => -task.duration,
                Selector::Keys(keys) => keys[base[j] + t] as i64,
            };
            if (key, j) < chosen_key {
                chosen_key = (key, j);
                chosen = Some(j);
            }
        }

        let j = chosen?;
        let t = next_task[j];
        let job = &instance.jobs[j];
        let task = &job.tasks[t];
        let is_last = t + 1 == job.tasks.len();

        // Place on the eligible machine with the earliest completion.
        let mut pick: Option<(i64, usize)> = None;
        for &m in &task.eligible {
            let machine = &instance.machines[m];
            let lo = job_ready[j].max(machine.avail_start);
            if let Some(start) = earliest_slot(&busy[m], lo, task.duration, machine.avail_end) {
                let end = start + task.duration;
                if is_last {
                    if let Some(latest) = job.latest_end {
                        if end > latest {
                            continue;
                        }
                    }
                }
                if pick.map_or(true, |(best_end, _)| end < best_end) {
                    pick = Some((end, m));
                }
            }
        }

        let (end, m) = pick?;
        let start = end - task.duration;
        let slot = busy[m].partition_point(|&(s, _)| s < start);
        busy[m].insert(slot, (start, end));
        placed.push(Placement {
            job: j,
            task: t,
            machine: m,
            start,
            end,
        });
        job_ready[j] = end;
        remaining[j] -= task.duration;
        next_task[j] += 1;
    }

    Some(placed)
}

fn score(instance: &Instance, placed: &[Placement], objective: ObjectiveType) -> Score {
    let mut job_end = vec![0_i64; instance.jobs.len()];
    let mut machine_load = vec![0_i64; instance.machines.len()];
    let mut makespan = 0_i64;
    for p in placed {
        job_end[p.job] = job_end[p.job].max(p.end);
        machine_load[p.machine] += p.end - p.start;
        makespan = makespan.max(p.end);
    }

    let has_due = instance.jobs.iter().any(|j| j.due_date.is_some());
    let primary = match objective {
        ObjectiveType::MinimizeMakespan => makespan,
        ObjectiveType::MinimizeTotalCompletionTime => job_end.iter().sum(),
        ObjectiveType::MinimizeTotalTardiness => {
            if has_due {
                instance
                    .jobs
                    .iter()
                    .enumerate()
                    .filter_map(|(j, job)| {
                        job.due_date
                            .map(|due| job.priority * (job_end[j] - due).max(0))
                    })
                    .sum()
            } else {
                makespan
            }
        }
        ObjectiveType::MinimizeMaxTardiness => {
            if has_due {
                instance
                    .jobs
                    .iter()
                    .enumerate()
                    .filter_map(|(j, job)| job.due_date.map(|due| (job_end[j] - due).max(0)))
                    .max()
                    .unwrap_or(0)
            } else {
                makespan
            }
        }
        ObjectiveType::BalanceLoad => machine_load.iter().copied().max().unwrap_or(0),
    };
    let secondary = match objective {
        ObjectiveType::BalanceLoad => makespan,
        _ => 0,
    };
    Score { primary, secondary }
}

fn extract_response(
    request: &ScheduleRequest,
    instance: &Instance,
    placed: &[Placement],
    status: SolverStatus,
    solve_time: f64,
) -> ScheduleResponse {
    let mut schedule = Vec::with_capacity(placed.len());
    let mut gantt = Vec::with_capacity(placed.len());
    let mut ordered: Vec<&Placement> = placed.iter().collect();
    ordered.sort_by_key(|p| (p.job, p.task));

    for p in ordered {
        let job = &instance.jobs[p.job];
        let task = &job.tasks[p.task];
        let machine = &instance.machines[p.machine];
        schedule.push(ScheduledTask {
            job_id: job.job_id.clone(),
            task_id: task.task_id.clone(),
            machine_id: machine.machine_id.clone(),
            start: p.start,
            end: p.end,
            duration: task.duration,
        });
        gantt.push(GanttEntry {
            job_id: job.job_id.clone(),
            task_id: task.task_id.clone(),
            machine_id: machine.machine_id.clone(),
            start: p.start,
            end: p.end,
            label: format!(
                "{} / {}",
                job.name.as_deref().unwrap_or(&job.job_id),
                task.task_id
            ),
        });
    }

    let job_summaries = compute_job_summaries(&request.jobs, &schedule);
    let total_span = schedule.iter().map(|st| st.end).max().unwrap_or(0);
    let machine_utilization =
        compute_machine_utilization(&request.machines, &schedule, total_span);
    let metrics = compute_metrics(&job_summaries, &machine_utilization, solve_time);

    let message = format!(
        "{} schedule found in {:.2}s. Makespan: {} time units.",
        if status == SolverStatus::Optimal {
            "Optimal"
        } else {
            "Feasible"
        },
        solve_time,
        metrics.makespan
    );

    ScheduleResponse {
        status,
        message,
        schedule,
        job_summaries,
        machine_utilization,
        metrics: Some(metrics),
        gantt,
    }
}

/// Per-job summary metrics. Shared with the validator.
pub(crate) fn compute_job_summaries(
    jobs: &[ops_core::schedule::Job],
    schedule: &[ScheduledTask],
) -> Vec<JobSummary> {
    let mut by_job: HashMap<&str, Vec<&ScheduledTask>> = HashMap::new();
    for st in schedule {
        by_job.entry(st.job_id.as_str()).or_default().push(st);
    }

    let mut summaries = Vec::new();
    for job in jobs {
        let Some(tasks) = by_job.get(job.job_id.as_str()) else {
            continue;
        };
        let start = tasks.iter().map(|t| t.start).min().unwrap_or(0);
        let end = tasks.iter().map(|t| t.end).max().unwrap_or(0);
        let tardiness = job.due_date.map_or(0, |due| (end - due).max(0));
        summaries.push(JobSummary {
            job_id: job.job_id.clone(),
            name: job.name.clone(),
            start,
            end,
            makespan: end - start,
            tardiness,
            on_time: tardiness == 0,
        });
    }
    summaries
}

/// Per-machine utilization against the schedule span.
pub(crate) fn compute_machine_utilization(
    machines: &[ops_core::schedule::Machine],
    schedule: &[ScheduledTask],
    total_span: i64,
) -> Vec<MachineUtilization> {
    let mut by_machine: HashMap<&str, Vec<&ScheduledTask>> = HashMap::new();
    for st in schedule {
        by_machine.entry(st.machine_id.as_str()).or_default().push(st);
    }

    let span = if total_span > 0 { total_span } else { 1 };
    machines
        .iter()
        .map(|m| {
            let tasks = by_machine.get(m.machine_id.as_str());
            let busy: i64 = tasks
                .map(|ts| ts.iter().map(|t| t.duration).sum())
                .unwrap_or(0);
            MachineUtilization {
                machine_id: m.machine_id.clone(),
                name: m.name.clone(),
                busy_time: busy,
                idle_time: (span - busy).max(0),
                utilization_pct: round1(busy as f64 / span as f64 * 100.0),
                num_tasks: tasks.map(|ts| ts.len()).unwrap_or(0),
            }
        })
        .collect()
}

/// Aggregate schedule metrics.
pub(crate) fn compute_metrics(
    job_summaries: &[JobSummary],
    machine_utilization: &[MachineUtilization],
    solve_time: f64,
) -> ScheduleMetrics {
    let makespan = job_summaries.iter().map(|j| j.end).max().unwrap_or(0);
    let total_tardiness = job_summaries.iter().map(|j| j.tardiness).sum();
    let max_tardiness = job_summaries.iter().map(|j| j.tardiness).max().unwrap_or(0);
    let num_on_time = job_summaries.iter().filter(|j| j.on_time).count();
    let num_late = job_summaries.len() - num_on_time;
    let total_completion_time = job_summaries.iter().map(|j| j.end).sum();
    let avg_util = if machine_utilization.is_empty() {
        0.0
    } else {
        machine_utilization
            .iter()
            .map(|m| m.utilization_pct)
            .sum::<f64>()
            / machine_utilization.len() as f64
    };
    ScheduleMetrics {
        makespan,
        total_tardiness,
        max_tardiness,
        num_on_time,
        num_late,
        total_completion_time,
        avg_machine_utilization_pct: round1(avg_util),
        solve_time_seconds: round3(solve_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earliest_slot_gap_fill() {
        let busy = [(0, 3), (5, 8)];
        // A 2-unit task fits in the [3, 5) gap.
        assert_eq!(earliest_slot(&busy, 0, 2, None), Some(3));
        // A 3-unit task does not; it goes after the last interval.
        assert_eq!(earliest_slot(&busy, 0, 3, None), Some(8));
        // Bounded by an availability end.
        assert_eq!(earliest_slot(&busy, 0, 3, Some(10)), None);
    }

    #[test]
    fn test_earliest_slot_respects_release() {
        let busy = [(2, 4)];
        assert_eq!(earliest_slot(&busy, 3, 1, None), Some(4));
        assert_eq!(earliest_slot(&busy, 5, 1, None), Some(5));
    }
}
