//! # Bin Packing Solver
//!
//! Multi-dimensional bin packing over weight, optional volume, and optional
//! per-bin item counts. Items and bins with `quantity > 1` are expanded
//! into distinct instances before the search; outputs surface the original
//! ids.
//!
//! Placement is deterministic and objective-specific:
//!
//! - `minimize_bins` - first-fit-decreasing over cost-ordered bins, then a
//!   repack pass that tries to empty the lightest used bin,
//! - `maximize_value` / `maximize_items` - density-ordered best-fit with a
//!   swap pass for displaced value,
//! - `balance_load` - spread placement minimizing the resulting weight
//!   utilization, then peak-shaving moves from the fullest to the emptiest
//!   used bin.
//!
//! With `keep_groups_together`, all instances sharing a group label form
//! one atomic unit that lands in a single bin. `Optimal` is reported when
//! a matching combinatorial bound certifies it (count lower bound for
//! uniform-cost min-bins, everything packed for the maximization
//! objectives); otherwise a solution is `Feasible`.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use ops_core::packing::{
    BinSummary, PackedItem, PackingMetrics, PackingObjective, PackingRequest, PackingResponse,
};
use ops_core::stats::{round1, round3};
use ops_core::SolverStatus;

struct ExpItem {
    original_id: String,
    name: Option<String>,
    weight: i64,
    volume: i64,
    value: i64,
    group: Option<String>,
}

struct ExpBin {
    original_id: String,
    name: Option<String>,
    weight_capacity: i64,
    volume_capacity: i64,
    max_items: Option<i64>,
    cost: i64,
}

/// An atomic placement unit: a single item instance, or a whole group when
/// groups are kept together.
struct Unit {
    members: Vec<usize>,
    weight: i64,
    volume: i64,
    value: i64,
    count: i64,
}

#[derive(Clone)]
struct BinState {
    weight: i64,
    volume: i64,
    count: i64,
    units: Vec<usize>,
}

fn expand_items(request: &PackingRequest) -> Vec<ExpItem> {
    let mut expanded = Vec::new();
    for item in &request.items {
        for _ in 0..item.quantity {
            expanded.push(ExpItem {
                original_id: item.item_id.clone(),
                name: item.name.clone(),
                weight: item.weight,
                volume: item.volume,
                value: item.value,
                group: item.group.clone(),
            });
        }
    }
    expanded
}

fn expand_bins(request: &PackingRequest) -> Vec<ExpBin> {
    let mut expanded = Vec::new();
    for b in &request.bins {
        for _ in 0..b.quantity {
            expanded.push(ExpBin {
                original_id: b.bin_id.clone(),
                name: b.name.clone(),
                weight_capacity: b.weight_capacity,
                volume_capacity: b.volume_capacity,
                max_items: b.max_items,
                cost: b.cost,
            });
        }
    }
    expanded
}

fn build_units(items: &[ExpItem], keep_groups: bool) -> Vec<Unit> {
    if !keep_groups {
        return items
            .iter()
            .enumerate()
            .map(|(i, item)| Unit {
                members: vec![i],
                weight: item.weight,
                volume: item.volume,
                value: item.value,
                count: 1,
            })
            .collect();
    }
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut units = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match &item.group {
            Some(g) => groups.entry(g.as_str()).or_default().push(i),
            None => units.push(Unit {
                members: vec![i],
                weight: item.weight,
                volume: item.volume,
                value: item.value,
                count: 1,
            }),
        }
    }
    let mut grouped: Vec<(&str, Vec<usize>)> = groups.into_iter().collect();
    grouped.sort_by_key(|(g, _)| g.to_string());
    for (_, members) in grouped {
        let weight = members.iter().map(|&i| items[i].weight).sum();
        let volume = members.iter().map(|&i| items[i].volume).sum();
        let value = members.iter().map(|&i| items[i].value).sum();
        let count = members.len() as i64;
        units.push(Unit {
            members,
            weight,
            volume,
            value,
            count,
        });
    }
    units
}

fn fits(bin: &ExpBin, state: &BinState, unit: &Unit) -> bool {
    if state.weight + unit.weight > bin.weight_capacity {
        return false;
    }
    if bin.volume_capacity > 0 && state.volume + unit.volume > bin.volume_capacity {
        return false;
    }
    if let Some(max) = bin.max_items {
        if state.count + unit.count > max {
            return false;
        }
    }
    true
}

fn place(state: &mut BinState, unit_idx: usize, unit: &Unit) {
    state.weight += unit.weight;
    state.volume += unit.volume;
    state.count += unit.count;
    state.units.push(unit_idx);
}

fn unplace(state: &mut BinState, unit_idx: usize, unit: &Unit) {
    state.weight -= unit.weight;
    state.volume -= unit.volume;
    state.count -= unit.count;
    state.units.retain(|&u| u != unit_idx);
}

/// Solve a bin packing problem.
pub fn solve_packing(request: &PackingRequest) -> PackingResponse {
    let t0 = Instant::now();
    let deadline =
        t0 + std::time::Duration::from_secs(request.max_solve_time_seconds.max(1) as u64);

    let items = expand_items(request);
    let bins = expand_bins(request);
    if items.is_empty() {
        return PackingResponse::failed(SolverStatus::Error, "No items to pack.");
    }
    if bins.is_empty() {
        return PackingResponse::failed(SolverStatus::Error, "No bins available.");
    }

    let units = build_units(&items, request.keep_groups_together);
    let mut states: Vec<BinState> = bins
        .iter()
        .map(|_| BinState {
            weight: 0,
            volume: 0,
            count: 0,
            units: Vec::new(),
        })
        .collect();

    let unplaced = match request.objective {
        PackingObjective::MinimizeBins => pack_min_bins(&units, &bins, &mut states, deadline),
        PackingObjective::MaximizeValue => pack_maximize(&units, &bins, &mut states, true),
        PackingObjective::MaximizeItems => pack_maximize(&units, &bins, &mut states, false),
        PackingObjective::BalanceLoad => pack_balanced(&units, &bins, &mut states, deadline),
    };

    if !unplaced.is_empty() && !request.allow_partial {
        return PackingResponse::failed(
            SolverStatus::NoSolution,
            "No feasible packing found. Total item weight/volume exceeds bin capacity. \
             Try adding bins or enabling allow_partial=true.",
        );
    }

    let status = classify(request, &units, &bins, &states, &unplaced);
    debug!(
        objective = ?request.objective,
        unplaced = unplaced.len(),
        status = %status,
        "packing search finished"
    );
    extract_response(
        request,
        &items,
        &bins,
        &units,
        &states,
        &unplaced,
        status,
        t0.elapsed().as_secs_f64(),
    )
}

/// First-fit-decreasing into cost-ordered bins, then try to empty the
/// lightest used bin by relocating its units.
fn pack_min_bins(
    units: &[Unit],
    bins: &[ExpBin],
    states: &mut [BinState],
    deadline: Instant,
) -> Vec<usize> {
    let mut unit_order: Vec<usize> = (0..units.len()).collect();
    unit_order.sort_by_key(|&u| (-units[u].weight, -units[u].volume, u));
    let mut bin_order: Vec<usize> = (0..bins.len()).collect();
    bin_order.sort_by_key(|&b| (bins[b].cost, -bins[b].weight_capacity, b));

    let mut unplaced = Vec::new();
    for &u in &unit_order {
        let mut placed = false;
        // Prefer bins already in use, in cost order.
        for pass in 0..2 {
            for &b in &bin_order {
                let in_use = !states[b].units.is_empty();
                if (pass == 0) != in_use {
                    continue;
                }
                if fits(&bins[b], &states[b], &units[u]) {
                    place(&mut states[b], u, &units[u]);
                    placed = true;
                    break;
                }
            }
            if placed {
                break;
            }
        }
        if !placed {
            unplaced.push(u);
        }
    }

    // Repack pass: free the lightest-loaded bin when its units fit elsewhere.
    loop {
        if Instant::now() >= deadline {
            break;
        }
        let lightest = states
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.units.is_empty())
            .min_by_key(|(b, s)| (s.weight, *b))
            .map(|(b, _)| b);
        let Some(light) = lightest else { break };
        let moved: Vec<usize> = states[light].units.clone();
        let mut relocation: Vec<(usize, usize)> = Vec::new();
        let mut trial: Vec<BinState> = states.to_vec();
        trial[light] = BinState {
            weight: 0,
            volume: 0,
            count: 0,
            units: Vec::new(),
        };
        let mut ok = true;
        for &u in &moved {
            let target = (0..bins.len())
                .filter(|&b| b != light && !trial[b].units.is_empty())
                .find(|&b| fits(&bins[b], &trial[b], &units[u]));
            match target {
                Some(b) => {
                    place(&mut trial[b], u, &units[u]);
                    relocation.push((u, b));
                }
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if ok && !relocation.is_empty() {
            states.clone_from_slice(&trial);
        } else {
            break;
        }
    }

    unplaced
}

/// Density-ordered best-fit for the maximization objectives, then one swap
/// pass that trades a packed unit for a more valuable unpacked one.
fn pack_maximize(
    units: &[Unit],
    bins: &[ExpBin],
    states: &mut [BinState],
    by_value: bool,
) -> Vec<usize> {
    let mut unit_order: Vec<usize> = (0..units.len()).collect();
    if by_value {
        // Highest value per unit of weight first.
        unit_order.sort_by(|&a, &b| {
            let da = units[a].value as f64 / units[a].weight.max(1) as f64;
            let db = units[b].value as f64 / units[b].weight.max(1) as f64;
            db.partial_cmp(&da)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(units[b].value.cmp(&units[a].value))
                .then(a.cmp(&b))
        });
    } else {
        unit_order.sort_by_key(|&u| (units[u].weight, units[u].volume, u));
    }

    let mut unplaced = Vec::new();
    for &u in &unit_order {
        // Best fit: tightest remaining weight capacity that still fits.
        let target = (0..bins.len())
            .filter(|&b| fits(&bins[b], &states[b], &units[u]))
            .min_by_key(|&b| (bins[b].weight_capacity - states[b].weight, b));
        match target {
            Some(b) => place(&mut states[b], u, &units[u]),
            None => unplaced.push(u),
        }
    }

    if by_value && !unplaced.is_empty() {
        let mut still_unplaced = Vec::new();
        for &u in &unplaced {
            let mut swapped = false;
            'bins: for b in 0..bins.len() {
                for &packed in states[b].units.clone().iter() {
                    if units[packed].value < units[u].value {
                        unplace(&mut states[b], packed, &units[packed]);
                        if fits(&bins[b], &states[b], &units[u]) {
                            place(&mut states[b], u, &units[u]);
                            still_unplaced.push(packed);
                            swapped = true;
                            break 'bins;
                        }
                        place(&mut states[b], packed, &units[packed]);
                    }
                }
            }
            if !swapped {
                still_unplaced.push(u);
            }
        }
        return still_unplaced;
    }

    unplaced
}

/// Spread placement for balance_load: each unit goes to the bin with the
/// lowest resulting utilization, then peak-shaving moves reduce the max.
fn pack_balanced(
    units: &[Unit],
    bins: &[ExpBin],
    states: &mut [BinState],
    deadline: Instant,
) -> Vec<usize> {
    let util = |b: usize, s: &BinState| -> f64 { s.weight as f64 / bins[b].weight_capacity as f64 };

    let mut unit_order: Vec<usize> = (0..units.len()).collect();
    unit_order.sort_by_key(|&u| (-units[u].weight, u));

    let mut unplaced = Vec::new();
    for &u in &unit_order {
        let target = (0..bins.len())
            .filter(|&b| fits(&bins[b], &states[b], &units[u]))
            .min_by(|&a, &b| {
                let ua = (states[a].weight + units[u].weight) as f64
                    / bins[a].weight_capacity as f64;
                let ub = (states[b].weight + units[u].weight) as f64
                    / bins[b].weight_capacity as f64;
                ua.partial_cmp(&ub)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });
        match target {
            Some(b) => place(&mut states[b], u, &units[u]),
            None => unplaced.push(u),
        }
    }

    loop {
        if Instant::now() >= deadline {
            break;
        }
        let Some(peak) = (0..bins.len())
            .filter(|&b| !states[b].units.is_empty())
            .max_by(|&a, &b| {
                util(a, &states[a])
                    .partial_cmp(&util(b, &states[b]))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        else {
            break;
        };
        let peak_util = util(peak, &states[peak]);
        let mut moved = false;
        let mut candidates = states[peak].units.clone();
        candidates.sort_by_key(|&u| (units[u].weight, u));
        'outer: for &u in &candidates {
            for b in 0..bins.len() {
                if b == peak || !fits(&bins[b], &states[b], &units[u]) {
                    continue;
                }
                let new_target =
                    (states[b].weight + units[u].weight) as f64 / bins[b].weight_capacity as f64;
                if new_target < peak_util {
                    unplace(&mut states[peak], u, &units[u]);
                    place(&mut states[b], u, &units[u]);
                    moved = true;
                    break 'outer;
                }
            }
        }
        if !moved {
            break;
        }
    }

    unplaced
}

fn classify(
    request: &PackingRequest,
    units: &[Unit],
    bins: &[ExpBin],
    states: &[BinState],
    unplaced: &[usize],
) -> SolverStatus {
    let all_packed = unplaced.is_empty();
    match request.objective {
        PackingObjective::MinimizeBins => {
            if !all_packed {
                return SolverStatus::Feasible;
            }
            let used = states.iter().filter(|s| !s.units.is_empty()).count();
            let uniform_cost = bins.windows(2).all(|w| w[0].cost == w[1].cost);
            let max_wcap = bins.iter().map(|b| b.weight_capacity).max().unwrap_or(1);
            let total_weight: i64 = units.iter().map(|u| u.weight).sum();
            let mut lb = (total_weight + max_wcap - 1) / max_wcap;
            if bins.iter().all(|b| b.volume_capacity > 0) {
                let max_vcap = bins.iter().map(|b| b.volume_capacity).max().unwrap_or(1);
                let total_volume: i64 = units.iter().map(|u| u.volume).sum();
                lb = lb.max((total_volume + max_vcap - 1) / max_vcap);
            }
            if uniform_cost && used as i64 <= lb.max(1) {
                SolverStatus::Optimal
            } else {
                SolverStatus::Feasible
            }
        }
        PackingObjective::MaximizeValue | PackingObjective::MaximizeItems => {
            if all_packed {
                SolverStatus::Optimal
            } else {
                SolverStatus::Feasible
            }
        }
        PackingObjective::BalanceLoad => SolverStatus::Feasible,
    }
}

#[allow(clippy::too_many_arguments)]
fn extract_response(
    request: &PackingRequest,
    items: &[ExpItem],
    bins: &[ExpBin],
    units: &[Unit],
    states: &[BinState],
    unplaced: &[usize],
    status: SolverStatus,
    solve_time: f64,
) -> PackingResponse {
    let mut assignments = Vec::new();
    let mut bin_summaries = Vec::with_capacity(bins.len());
    let mut total_bin_cost = 0_i64;
    let mut weight_utils = Vec::new();
    let mut volume_utils = Vec::new();

    for (b, bin) in bins.iter().enumerate() {
        let state = &states[b];
        let is_used = !state.units.is_empty();
        let mut member_items: Vec<usize> = state
            .units
            .iter()
            .flat_map(|&u| units[u].members.iter().copied())
            .collect();
        member_items.sort_unstable();

        for &i in &member_items {
            assignments.push(PackedItem {
                item_id: items[i].original_id.clone(),
                name: items[i].name.clone(),
                bin_id: bin.original_id.clone(),
                bin_name: bin.name.clone(),
                weight: items[i].weight,
                volume: items[i].volume,
                value: items[i].value,
            });
        }

        let w_pct = round1(state.weight as f64 / bin.weight_capacity as f64 * 100.0);
        let v_pct = if bin.volume_capacity > 0 {
            round1(state.volume as f64 / bin.volume_capacity as f64 * 100.0)
        } else {
            0.0
        };
        if is_used {
            total_bin_cost += bin.cost;
            weight_utils.push(w_pct);
            if bin.volume_capacity > 0 {
                volume_utils.push(v_pct);
            }
        }
        bin_summaries.push(BinSummary {
            bin_id: bin.original_id.clone(),
            name: bin.name.clone(),
            is_used,
            items_packed: member_items.len(),
            weight_used: state.weight,
            weight_capacity: bin.weight_capacity,
            weight_utilization_pct: w_pct,
            volume_used: state.volume,
            volume_capacity: bin.volume_capacity,
            volume_utilization_pct: v_pct,
            total_value: member_items.iter().map(|&i| items[i].value).sum(),
            item_ids: member_items
                .iter()
                .map(|&i| items[i].original_id.clone())
                .collect(),
        });
    }

    let unpacked: Vec<String> = unplaced
        .iter()
        .flat_map(|&u| units[u].members.iter().copied())
        .map(|i| items[i].original_id.clone())
        .collect();

    let bins_used = bin_summaries.iter().filter(|s| s.is_used).count();
    let avg_w = if weight_utils.is_empty() {
        0.0
    } else {
        weight_utils.iter().sum::<f64>() / weight_utils.len() as f64
    };
    let avg_v = if volume_utils.is_empty() {
        0.0
    } else {
        volume_utils.iter().sum::<f64>() / volume_utils.len() as f64
    };

    let metrics = PackingMetrics {
        bins_used,
        bins_available: bins.len(),
        items_packed: assignments.len(),
        items_unpacked: unpacked.len(),
        unpacked_item_ids: unpacked.clone(),
        total_value_packed: assignments.iter().map(|a| a.value).sum(),
        total_weight_packed: assignments.iter().map(|a| a.weight).sum(),
        total_volume_packed: assignments.iter().map(|a| a.volume).sum(),
        avg_weight_utilization_pct: round1(avg_w),
        avg_volume_utilization_pct: round1(avg_v),
        total_waste_pct: round1(100.0 - avg_w),
        total_bin_cost,
        solve_time_seconds: round3(solve_time),
    };

    let mut msg_parts = vec![
        format!(
            "{} packing found in {:.2}s.",
            if status == SolverStatus::Optimal {
                "Optimal"
            } else {
                "Feasible"
            },
            solve_time
        ),
        format!("{}/{} bins used.", bins_used, bins.len()),
        format!("{}/{} items packed.", assignments.len(), items.len()),
    ];
    if !unpacked.is_empty() {
        msg_parts.push(format!("{} items unpacked.", unpacked.len()));
    }

    PackingResponse {
        status,
        message: msg_parts.join(" "),
        assignments,
        bin_summaries,
        metrics: Some(metrics),
        unpacked_items: unpacked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_units_are_atomic() {
        let items = vec![
            ExpItem {
                original_id: "a".into(),
                name: None,
                weight: 3,
                volume: 0,
                value: 1,
                group: Some("g".into()),
            },
            ExpItem {
                original_id: "b".into(),
                name: None,
                weight: 4,
                volume: 0,
                value: 2,
                group: Some("g".into()),
            },
            ExpItem {
                original_id: "c".into(),
                name: None,
                weight: 5,
                volume: 0,
                value: 3,
                group: None,
            },
        ];
        let units = build_units(&items, true);
        assert_eq!(units.len(), 2);
        let group_unit = units.iter().find(|u| u.members.len() == 2).unwrap();
        assert_eq!(group_unit.weight, 7);
        assert_eq!(group_unit.count, 2);
    }

    #[test]
    fn test_fits_checks_all_dimensions() {
        let bin = ExpBin {
            original_id: "b".into(),
            name: None,
            weight_capacity: 10,
            volume_capacity: 5,
            max_items: Some(2),
            cost: 1,
        };
        let mut state = BinState {
            weight: 0,
            volume: 0,
            count: 0,
            units: Vec::new(),
        };
        let unit = Unit {
            members: vec![0],
            weight: 6,
            volume: 3,
            value: 1,
            count: 1,
        };
        assert!(fits(&bin, &state, &unit));
        place(&mut state, 0, &unit);
        // Second copy exceeds both weight and volume.
        assert!(!fits(&bin, &state, &unit));
    }
}
