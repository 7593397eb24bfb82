//! Packing solver tests

use ops_core::packing::{Bin, Item, PackingObjective, PackingRequest};
use ops_core::SolverStatus;
use ops_solve::solve_packing;

fn item(id: &str, weight: i64, quantity: i64) -> Item {
    Item {
        item_id: id.to_string(),
        name: None,
        weight,
        volume: 0,
        value: 1,
        quantity,
        group: None,
    }
}

fn bin(id: &str, weight_capacity: i64, quantity: i64) -> Bin {
    Bin {
        bin_id: id.to_string(),
        name: None,
        weight_capacity,
        volume_capacity: 0,
        max_items: None,
        cost: 1,
        quantity,
    }
}

fn request(items: Vec<Item>, bins: Vec<Bin>, objective: PackingObjective) -> PackingRequest {
    PackingRequest {
        items,
        bins,
        objective,
        max_solve_time_seconds: 5,
        allow_partial: false,
        keep_groups_together: false,
    }
}

#[test]
fn test_min_bins_uses_single_bin() {
    let req = request(
        vec![item("box", 10, 3)],
        vec![bin("pallet", 50, 5)],
        PackingObjective::MinimizeBins,
    );
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    let metrics = resp.metrics.expect("metrics");
    assert_eq!(metrics.bins_used, 1, "30 units of weight fit one 50-cap bin");
    assert_eq!(metrics.items_packed, 3);
    assert_eq!(metrics.items_unpacked, 0);
}

#[test]
fn test_min_bins_lower_bound_is_optimal() {
    let req = request(
        vec![item("box", 10, 3)],
        vec![bin("pallet", 50, 5)],
        PackingObjective::MinimizeBins,
    );
    let resp = solve_packing(&req);
    assert_eq!(resp.status, SolverStatus::Optimal, "{}", resp.message);
}

#[test]
fn test_capacity_invariants_hold() {
    let req = request(
        vec![item("a", 7, 4), item("b", 5, 3)],
        vec![bin("small", 20, 3)],
        PackingObjective::MinimizeBins,
    );
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    for summary in &resp.bin_summaries {
        assert!(
            summary.weight_used <= summary.weight_capacity,
            "bin {} overweight: {}/{}",
            summary.bin_id,
            summary.weight_used,
            summary.weight_capacity
        );
        assert_eq!(summary.is_used, summary.items_packed > 0);
    }
    let metrics = resp.metrics.expect("metrics");
    assert_eq!(metrics.items_packed + metrics.items_unpacked, 7);
}

#[test]
fn test_overflow_without_partial_is_no_solution() {
    let req = request(
        vec![item("rock", 30, 4)],
        vec![bin("crate", 50, 1)],
        PackingObjective::MinimizeBins,
    );
    let resp = solve_packing(&req);
    assert_eq!(resp.status, SolverStatus::NoSolution, "{}", resp.message);
    assert!(resp.message.contains("allow_partial"));
}

#[test]
fn test_partial_packs_what_fits() {
    let mut req = request(
        vec![item("rock", 30, 4)],
        vec![bin("crate", 50, 1)],
        PackingObjective::MinimizeBins,
    );
    req.allow_partial = true;
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    let metrics = resp.metrics.expect("metrics");
    assert_eq!(metrics.items_packed, 1);
    assert_eq!(metrics.items_unpacked, 3);
    assert_eq!(metrics.items_packed + metrics.items_unpacked, 4);
}

#[test]
fn test_maximize_value_prefers_dense_items() {
    let gold = Item {
        item_id: "gold".to_string(),
        name: None,
        weight: 10,
        volume: 0,
        value: 100,
        quantity: 1,
        group: None,
    };
    let lead = Item {
        item_id: "lead".to_string(),
        name: None,
        weight: 10,
        volume: 0,
        value: 1,
        quantity: 1,
        group: None,
    };
    let mut req = request(
        vec![gold, lead],
        vec![bin("crate", 10, 1)],
        PackingObjective::MaximizeValue,
    );
    req.allow_partial = true;
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    assert_eq!(resp.assignments.len(), 1);
    assert_eq!(resp.assignments[0].item_id, "gold");
    assert_eq!(resp.metrics.unwrap().total_value_packed, 100);
}

#[test]
fn test_groups_stay_together() {
    let mut a = item("a", 10, 1);
    a.group = Some("kit".to_string());
    let mut b = item("b", 10, 1);
    b.group = Some("kit".to_string());
    let mut req = request(
        vec![a, b, item("c", 15, 1)],
        vec![bin("boxy", 25, 3)],
        PackingObjective::MinimizeBins,
    );
    req.keep_groups_together = true;
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);

    let bin_of = |id: &str| -> usize {
        resp.bin_summaries
            .iter()
            .position(|s| s.item_ids.iter().any(|i| i == id))
            .expect("packed")
    };
    assert_eq!(bin_of("a"), bin_of("b"), "grouped items must share a bin");
}

#[test]
fn test_volume_constraint_respected() {
    let bulky = Item {
        item_id: "bulky".to_string(),
        name: None,
        weight: 1,
        volume: 8,
        value: 1,
        quantity: 3,
        group: None,
    };
    let req = request(
        vec![bulky],
        vec![Bin {
            bin_id: "vbin".to_string(),
            name: None,
            weight_capacity: 100,
            volume_capacity: 10,
            max_items: None,
            cost: 1,
            quantity: 3,
        }],
        PackingObjective::MinimizeBins,
    );
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    for summary in &resp.bin_summaries {
        assert!(summary.volume_used <= summary.volume_capacity);
    }
    assert_eq!(resp.metrics.unwrap().bins_used, 3, "one 8-volume item per bin");
}

#[test]
fn test_max_items_per_bin() {
    let mut b = bin("limited", 100, 2);
    b.max_items = Some(2);
    let req = request(vec![item("nut", 1, 4)], vec![b], PackingObjective::MinimizeBins);
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    for summary in &resp.bin_summaries {
        assert!(summary.items_packed <= 2);
    }
}

#[test]
fn test_balance_load_spreads() {
    let req = request(
        vec![item("block", 10, 4)],
        vec![bin("shelf", 40, 2)],
        PackingObjective::BalanceLoad,
    );
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    let used: Vec<_> = resp.bin_summaries.iter().filter(|s| s.is_used).collect();
    assert_eq!(used.len(), 2, "balanced packing should use both bins");
    assert_eq!(used[0].weight_used, used[1].weight_used);
}

#[test]
fn test_original_ids_surfaced_after_expansion() {
    let req = request(
        vec![item("box", 10, 3)],
        vec![bin("pallet", 15, 3)],
        PackingObjective::MinimizeBins,
    );
    let resp = solve_packing(&req);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    for a in &resp.assignments {
        assert_eq!(a.item_id, "box");
        assert_eq!(a.bin_id, "pallet");
    }
}
