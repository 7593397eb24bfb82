//! Schedule solver tests

use ops_core::schedule::{
    Job, Machine, ObjectiveType, ScheduleRequest, Task, TimeWindow,
};
use ops_core::SolverStatus;
use ops_solve::solve_schedule;

fn task(task_id: &str, duration: i64, machines: &[&str]) -> Task {
    Task {
        task_id: task_id.to_string(),
        duration,
        eligible_machines: machines.iter().map(|m| m.to_string()).collect(),
        setup_time: 0,
    }
}

fn job(job_id: &str, tasks: Vec<Task>) -> Job {
    Job {
        job_id: job_id.to_string(),
        name: None,
        tasks,
        priority: 1,
        due_date: None,
        time_window: None,
    }
}

fn machine(machine_id: &str) -> Machine {
    Machine {
        machine_id: machine_id.to_string(),
        name: None,
        availability_start: 0,
        availability_end: None,
    }
}

/// Two jobs, two machines, both jobs cut on M1 then weld on M2.
fn two_by_two() -> ScheduleRequest {
    ScheduleRequest {
        jobs: vec![
            job("J1", vec![task("cut", 3, &["M1"]), task("weld", 2, &["M2"])]),
            job("J2", vec![task("cut", 2, &["M1"]), task("weld", 4, &["M2"])]),
        ],
        machines: vec![machine("M1"), machine("M2")],
        objective: ObjectiveType::MinimizeMakespan,
        max_solve_time_seconds: 5,
    }
}

#[test]
fn test_two_by_two_makespan() {
    let resp = solve_schedule(&two_by_two());
    assert!(
        matches!(resp.status, SolverStatus::Optimal | SolverStatus::Feasible),
        "expected a schedule, got {:?}: {}",
        resp.status,
        resp.message
    );
    let metrics = resp.metrics.expect("metrics");
    // M2 carries 6 units of weld work and cannot start before the first cut
    // finishes at t=2, so the best possible makespan is 8.
    assert_eq!(metrics.makespan, 8, "optimal makespan is 8");
    assert_eq!(resp.schedule.len(), 4, "all four tasks scheduled");
    for st in &resp.schedule {
        let expected_machine = if st.task_id == "cut" { "M1" } else { "M2" };
        assert_eq!(st.machine_id, expected_machine);
        assert_eq!(st.start + st.duration, st.end);
    }
}

#[test]
fn test_two_by_two_is_proven_optimal() {
    let resp = solve_schedule(&two_by_two());
    assert_eq!(resp.status, SolverStatus::Optimal, "{}", resp.message);
}

#[test]
fn test_flexible_machine_choice() {
    let request = ScheduleRequest {
        jobs: vec![
            job("J1", vec![task("cut", 3, &["M1"]), task("weld", 2, &["M2", "M3"])]),
            job("J2", vec![task("polish", 4, &["M2"])]),
        ],
        machines: vec![machine("M1"), machine("M2"), machine("M3")],
        objective: ObjectiveType::MinimizeMakespan,
        max_solve_time_seconds: 5,
    };
    let resp = solve_schedule(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);

    let weld = resp
        .schedule
        .iter()
        .find(|st| st.job_id == "J1" && st.task_id == "weld")
        .expect("weld scheduled");
    assert!(
        weld.machine_id == "M2" || weld.machine_id == "M3",
        "weld must run on an eligible machine, got {}",
        weld.machine_id
    );

    let cut = resp
        .schedule
        .iter()
        .find(|st| st.job_id == "J1" && st.task_id == "cut")
        .expect("cut scheduled");
    assert!(weld.start >= cut.end, "precedence within J1 must hold");
}

#[test]
fn test_no_overlap_per_machine() {
    let request = ScheduleRequest {
        jobs: (0..5)
            .map(|i| job(&format!("J{i}"), vec![task("op", 3, &["M1", "M2"])]))
            .collect(),
        machines: vec![machine("M1"), machine("M2")],
        objective: ObjectiveType::MinimizeMakespan,
        max_solve_time_seconds: 5,
    };
    let resp = solve_schedule(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);

    for m in ["M1", "M2"] {
        let mut on_machine: Vec<_> = resp
            .schedule
            .iter()
            .filter(|st| st.machine_id == m)
            .collect();
        on_machine.sort_by_key(|st| st.start);
        for pair in on_machine.windows(2) {
            assert!(
                pair[0].end <= pair[1].start,
                "tasks overlap on {m}: {:?} and {:?}",
                (pair[0].start, pair[0].end),
                (pair[1].start, pair[1].end)
            );
        }
    }
}

#[test]
fn test_unknown_machine_is_error() {
    let request = ScheduleRequest {
        jobs: vec![job("J1", vec![task("cut", 3, &["MX"])])],
        machines: vec![machine("M1")],
        objective: ObjectiveType::MinimizeMakespan,
        max_solve_time_seconds: 5,
    };
    let resp = solve_schedule(&request);
    assert_eq!(resp.status, SolverStatus::Error);
    assert!(resp.message.contains("MX"), "{}", resp.message);
}

#[test]
fn test_impossible_time_window_is_infeasible() {
    let mut request = two_by_two();
    request.jobs[0].time_window = Some(TimeWindow {
        earliest_start: 0,
        latest_end: Some(3), // chain needs 5 units
    });
    let resp = solve_schedule(&request);
    assert_eq!(resp.status, SolverStatus::Infeasible, "{}", resp.message);
}

#[test]
fn test_tardiness_objective_and_metrics() {
    let mut request = two_by_two();
    request.objective = ObjectiveType::MinimizeTotalTardiness;
    request.jobs[0].due_date = Some(4);
    request.jobs[1].due_date = Some(10);
    let resp = solve_schedule(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    let metrics = resp.metrics.expect("metrics");

    for summary in &resp.job_summaries {
        let job = request
            .jobs
            .iter()
            .find(|j| j.job_id == summary.job_id)
            .unwrap();
        let expected = job.due_date.map_or(0, |d| (summary.end - d).max(0));
        assert_eq!(summary.tardiness, expected);
        assert_eq!(summary.on_time, expected == 0);
    }
    assert_eq!(
        metrics.total_tardiness,
        resp.job_summaries.iter().map(|j| j.tardiness).sum::<i64>()
    );
}

#[test]
fn test_machine_availability_respected() {
    let request = ScheduleRequest {
        jobs: vec![job("J1", vec![task("cut", 3, &["M1"])])],
        machines: vec![Machine {
            machine_id: "M1".to_string(),
            name: None,
            availability_start: 10,
            availability_end: None,
        }],
        objective: ObjectiveType::MinimizeMakespan,
        max_solve_time_seconds: 5,
    };
    let resp = solve_schedule(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    assert!(resp.schedule[0].start >= 10);
}

#[test]
fn test_balance_load_spreads_work() {
    let request = ScheduleRequest {
        jobs: (0..4)
            .map(|i| job(&format!("J{i}"), vec![task("op", 5, &["M1", "M2"])]))
            .collect(),
        machines: vec![machine("M1"), machine("M2")],
        objective: ObjectiveType::BalanceLoad,
        max_solve_time_seconds: 5,
    };
    let resp = solve_schedule(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    let busy: Vec<i64> = resp
        .machine_utilization
        .iter()
        .map(|m| m.busy_time)
        .collect();
    assert_eq!(busy.iter().sum::<i64>(), 20);
    assert_eq!(busy.iter().copied().max(), Some(10), "load should split 10/10");
}

#[test]
fn test_solver_is_deterministic() {
    let request = two_by_two();
    let a = solve_schedule(&request);
    let b = solve_schedule(&request);
    assert_eq!(a.status, b.status);
    assert_eq!(
        a.metrics.as_ref().unwrap().makespan,
        b.metrics.as_ref().unwrap().makespan
    );
    let pairs = a.schedule.iter().zip(b.schedule.iter());
    for (x, y) in pairs {
        assert_eq!((x.start, x.end, &x.machine_id), (y.start, y.end, &y.machine_id));
    }
}

#[test]
fn test_gantt_projection_matches_schedule() {
    let resp = solve_schedule(&two_by_two());
    assert_eq!(resp.gantt.len(), resp.schedule.len());
    for (g, st) in resp.gantt.iter().zip(resp.schedule.iter()) {
        assert_eq!(g.start, st.start);
        assert_eq!(g.end, st.end);
        assert!(g.label.contains(&st.task_id));
    }
}
