//! # CVRPTW Routing Solver
//!
//! Capacitated vehicle routing with time windows over an explicit or
//! GPS-derived distance matrix.
//!
//! The search is deterministic: cheapest-feasible-insertion construction
//! followed by relocate and intra-route 2-opt improvement passes under the
//! request's wall-clock budget. Arc cost is parameterized by objective -
//! `minimize_total_time` optimizes the travel-time matrix plus origin
//! service times, every other objective optimizes distance.
//! `minimize_vehicles` adds a large fixed cost per used vehicle and
//! `balance_routes` penalizes the spread between the most and least
//! expensive used routes.
//!
//! A request whose locations cannot all be served maps to `NoSolution`
//! (with drop-visits disabled) or to a `Feasible` solution with dropped
//! locations; serving every non-depot location reports `Optimal`, which is
//! the contract's status mapping rather than a proof of cost optimality.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use ops_core::routing::{
    RouteStop, RoutingMetrics, RoutingObjective, RoutingRequest, RoutingResponse, VehicleRoute,
};
use ops_core::stats::{round1, round3};
use ops_core::SolverStatus;

/// Earth radius in meters for Haversine distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Fixed cost added per used vehicle under `minimize_vehicles`.
const VEHICLE_COST: i64 = 100_000;
/// Span penalty coefficient under `balance_routes`.
const BALANCE_COEFF: i64 = 100;
/// Improvement pass budget; fixed so identical requests solve identically.
const MAX_PASSES: usize = 40;

fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> i64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    (2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())) as i64
}

struct Matrices {
    dist: Vec<Vec<i64>>,
    time: Vec<Vec<i64>>,
}

fn build_matrices(request: &RoutingRequest, loc_index: &HashMap<&str, usize>) -> Matrices {
    let n = request.locations.len();
    let mut dist = vec![vec![0_i64; n]; n];
    let mut time = vec![vec![0_i64; n]; n];

    let mut custom: HashMap<(usize, usize), (i64, Option<i64>)> = HashMap::new();
    if let Some(entries) = &request.distance_matrix {
        for entry in entries {
            if let (Some(&fi), Some(&ti)) = (
                loc_index.get(entry.from_id.as_str()),
                loc_index.get(entry.to_id.as_str()),
            ) {
                custom.insert((fi, ti), (entry.distance, entry.travel_time));
            }
        }
    }

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if let Some(&(d, t)) = custom.get(&(i, j)) {
                dist[i][j] = d;
                time[i][j] = t.unwrap_or(d);
            } else {
                let li = &request.locations[i];
                let lj = &request.locations[j];
                if let (Some(lat1), Some(lon1), Some(lat2), Some(lon2)) =
                    (li.latitude, li.longitude, lj.latitude, lj.longitude)
                {
                    let d = haversine(lat1, lon1, lat2, lon2);
                    dist[i][j] = d;
                    time[i][j] = d;
                }
            }
        }
    }

    Matrices { dist, time }
}

/// Per-stop timing produced by a route simulation.
struct StopEval {
    arrival: i64,
    wait: i64,
    departure: i64,
    load_after: i64,
}

struct RouteEval {
    stops: Vec<StopEval>,
    distance: i64,
    /// Arrival time back at the depot.
    end_time: i64,
    load: i64,
    /// Arc cost on the objective's cost matrix.
    cost: i64,
}

struct Ctx<'a> {
    request: &'a RoutingRequest,
    depot: usize,
    mat: Matrices,
    /// Arc cost per objective: time matrix + origin service, or distance.
    cost: Vec<Vec<i64>>,
}

impl Ctx<'_> {
    /// Simulate a route (customer indices, depot excluded). Returns None
    /// when capacity, time windows, or vehicle limits are violated.
    fn simulate(&self, vehicle: usize, route: &[usize]) -> Option<RouteEval> {
        let veh = &self.request.vehicles[vehicle];
        let depot_loc = &self.request.locations[self.depot];
        if route.is_empty() {
            return Some(RouteEval {
                stops: Vec::new(),
                distance: 0,
                end_time: depot_loc.time_window_start,
                load: 0,
                cost: 0,
            });
        }

        let mut load = 0_i64;
        for &s in route {
            load += self.request.locations[s].demand;
        }
        if load > veh.capacity {
            return None;
        }

        let mut stops = Vec::with_capacity(route.len());
        let mut distance = 0_i64;
        let mut cost = 0_i64;
        let mut prev = self.depot;
        let mut departure = depot_loc.time_window_start + depot_loc.service_time;

        for &s in route {
            let loc = &self.request.locations[s];
            let arrival = departure + self.mat.time[prev][s];
            if let Some(end) = loc.time_window_end {
                if arrival > end {
                    return None;
                }
            }
            let wait = (loc.time_window_start - arrival).max(0);
            distance += self.mat.dist[prev][s];
            cost += self.cost[prev][s];
            let depart = arrival + wait + loc.service_time;
            stops.push(StopEval {
                arrival,
                wait,
                departure: depart,
                load_after: 0, // filled below, cumulative
            });
            departure = depart;
            prev = s;
        }

        let mut running = 0_i64;
        for (idx, &s) in route.iter().enumerate() {
            running += self.request.locations[s].demand;
            stops[idx].load_after = running;
        }

        let end_time = departure + self.mat.time[prev][self.depot];
        distance += self.mat.dist[prev][self.depot];
        cost += self.cost[prev][self.depot];

        if let Some(end) = depot_loc.time_window_end {
            if end_time > end {
                return None;
            }
        }
        if let Some(max_t) = veh.max_travel_time {
            if end_time > max_t {
                return None;
            }
        }
        if let Some(max_d) = veh.max_travel_distance {
            if distance > max_d {
                return None;
            }
        }

        Some(RouteEval {
            stops,
            distance,
            end_time,
            load,
            cost,
        })
    }

    /// Total comparison cost of a full solution.
    fn solution_cost(&self, routes: &[Vec<usize>], evals: &[Option<RouteEval>], dropped: usize) -> i64 {
        let mut total = 0_i64;
        let mut max_cost = i64::MIN;
        let mut min_cost = i64::MAX;
        let mut any_used = false;
        for (v, route) in routes.iter().enumerate() {
            let Some(eval) = &evals[v] else { continue };
            if route.is_empty() {
                continue;
            }
            any_used = true;
            total += eval.cost + self.request.vehicles[v].fixed_cost;
            if self.request.objective == RoutingObjective::MinimizeVehicles {
                total += VEHICLE_COST;
            }
            max_cost = max_cost.max(eval.cost);
            min_cost = min_cost.min(eval.cost);
        }
        if self.request.objective == RoutingObjective::BalanceRoutes && any_used {
            total += BALANCE_COEFF * (max_cost - min_cost);
        }
        total + self.request.drop_penalty * dropped as i64
    }
}

/// Solve a capacitated vehicle routing problem with time windows.
pub fn solve_routing(request: &RoutingRequest) -> RoutingResponse {
    let t0 = Instant::now();
    let deadline =
        t0 + std::time::Duration::from_secs(request.max_solve_time_seconds.max(1) as u64);

    let loc_index: HashMap<&str, usize> = request
        .locations
        .iter()
        .enumerate()
        .map(|(i, l)| (l.location_id.as_str(), i))
        .collect();

    let Some(&depot) = loc_index.get(request.depot_id.as_str()) else {
        return RoutingResponse::failed(
            SolverStatus::Error,
            format!("Depot '{}' not found in locations list.", request.depot_id),
        );
    };

    let mat = build_matrices(request, &loc_index);
    let n = request.locations.len();
    let cost = match request.objective {
        RoutingObjective::MinimizeTotalTime => {
            let mut c = vec![vec![0_i64; n]; n];
            for i in 0..n {
                for j in 0..n {
                    if i != j {
                        c[i][j] = mat.time[i][j] + request.locations[i].service_time;
                    }
                }
            }
            c
        }
        _ => mat.dist.clone(),
    };
    let ctx = Ctx {
        request,
        depot,
        mat,
        cost,
    };

    let num_vehicles = request.vehicles.len();
    let mut routes: Vec<Vec<usize>> = vec![Vec::new(); num_vehicles];
    let mut unrouted: Vec<usize> = (0..n).filter(|&i| i != depot).collect();

    // Cheapest-feasible-insertion construction.
    loop {
        let mut best: Option<(i64, usize, usize, usize)> = None; // (delta, loc, vehicle, pos)
        for &loc in &unrouted {
            for v in 0..num_vehicles {
                let base = ctx
                    .simulate(v, &routes[v])
                    .map(|e| e.cost)
                    .unwrap_or(i64::MAX);
                for pos in 0..=routes[v].len() {
                    let mut candidate = routes[v].clone();
                    candidate.insert(pos, loc);
                    if let Some(eval) = ctx.simulate(v, &candidate) {
                        let mut delta = eval.cost - if base == i64::MAX { 0 } else { base };
                        if routes[v].is_empty() {
                            delta += request.vehicles[v].fixed_cost;
                            if request.objective == RoutingObjective::MinimizeVehicles {
                                delta += VEHICLE_COST;
                            }
                        }
                        if best.map_or(true, |(d, ..)| delta < d) {
                            best = Some((delta, loc, v, pos));
                        }
                    }
                }
            }
        }
        match best {
            // Serving a visit never pays once it costs more than dropping
            // it, and the global best is the cheapest remaining insertion.
            Some((delta, ..)) if request.allow_drop_visits && delta > request.drop_penalty => {
                break;
            }
            Some((_, loc, v, pos)) => {
                routes[v].insert(pos, loc);
                unrouted.retain(|&l| l != loc);
            }
            None => break,
        }
        if unrouted.is_empty() || Instant::now() >= deadline {
            break;
        }
    }

    if !unrouted.is_empty() && !request.allow_drop_visits {
        if Instant::now() >= deadline {
            return RoutingResponse::failed(
                SolverStatus::Timeout,
                format!(
                    "Solver timed out after {}s. Try increasing time limit, adding vehicles, \
                     or enabling allow_drop_visits.",
                    request.max_solve_time_seconds
                ),
            );
        }
        return RoutingResponse::failed(
            SolverStatus::NoSolution,
            "No feasible solution found. Check: vehicle capacities vs demands, time windows \
             compatibility, and number of vehicles. Try enabling allow_drop_visits=true."
                .to_string(),
        );
    }

    improve(&ctx, &mut routes, &mut unrouted, deadline);

    let evals: Vec<Option<RouteEval>> = routes
        .iter()
        .enumerate()
        .map(|(v, r)| ctx.simulate(v, r))
        .collect();

    debug!(
        vehicles = num_vehicles,
        dropped = unrouted.len(),
        cost = ctx.solution_cost(&routes, &evals, unrouted.len()),
        "routing search finished"
    );

    extract_response(request, &routes, &evals, &unrouted, t0.elapsed().as_secs_f64())
}

/// Relocate + intra-route 2-opt improvement, strict-decrease acceptance.
fn improve(ctx: &Ctx<'_>, routes: &mut [Vec<usize>], unrouted: &mut Vec<usize>, deadline: Instant) {
    let num_vehicles = routes.len();
    for _pass in 0..MAX_PASSES {
        if Instant::now() >= deadline {
            return;
        }
        let mut improved = false;

        let eval_all = |routes: &[Vec<usize>]| -> Vec<Option<RouteEval>> {
            routes
                .iter()
                .enumerate()
                .map(|(v, r)| ctx.simulate(v, r))
                .collect()
        };
        let mut current_cost = ctx.solution_cost(routes, &eval_all(routes), unrouted.len());

        // Relocate one customer to any other feasible position.
        for a in 0..num_vehicles {
            for pos_a in 0..routes[a].len() {
                let loc = routes[a][pos_a];
                for b in 0..num_vehicles {
                    let positions = if a == b {
                        routes[b].len()
                    } else {
                        routes[b].len() + 1
                    };
                    for pos_b in 0..positions {
                        if a == b && pos_b == pos_a {
                            continue;
                        }
                        let mut trial: Vec<Vec<usize>> = routes.to_vec();
                        trial[a].remove(pos_a);
                        let insert_at = if a == b && pos_b > pos_a {
                            pos_b
                        } else {
                            pos_b.min(trial[b].len())
                        };
                        trial[b].insert(insert_at, loc);
                        let evals = eval_all(&trial);
                        if evals[a].is_none() || evals[b].is_none() {
                            continue;
                        }
                        let cost = ctx.solution_cost(&trial, &evals, unrouted.len());
                        if cost < current_cost {
                            routes[a] = trial[a].clone();
                            routes[b] = trial[b].clone();
                            current_cost = cost;
                            improved = true;
                            break;
                        }
                    }
                    if improved {
                        break;
                    }
                }
                if improved {
                    break;
                }
            }
            if improved {
                break;
            }
        }

        // Intra-route 2-opt: reverse a segment when it pays off.
        if !improved {
            'twoopt: for v in 0..num_vehicles {
                let len = routes[v].len();
                if len < 3 {
                    continue;
                }
                for i in 0..len - 1 {
                    for j in i + 1..len {
                        let mut trial = routes[v].clone();
                        trial[i..=j].reverse();
                        if let Some(eval) = ctx.simulate(v, &trial) {
                            let mut all: Vec<Vec<usize>> = routes.to_vec();
                            all[v] = trial;
                            let mut evals = eval_all(&all);
                            evals[v] = Some(eval);
                            let cost = ctx.solution_cost(&all, &evals, unrouted.len());
                            if cost < current_cost {
                                routes[v] = all[v].clone();
                                improved = true;
                                break 'twoopt;
                            }
                        }
                    }
                }
            }
        }

        // A move may have opened room for a dropped location; reinsert only
        // when serving it is cheaper than its drop penalty.
        if !improved && !unrouted.is_empty() {
            let mut inserted = None;
            'reinsert: for &loc in unrouted.iter() {
                for v in 0..num_vehicles {
                    let base = ctx
                        .simulate(v, &routes[v])
                        .map(|e| e.cost)
                        .unwrap_or(i64::MAX);
                    for pos in 0..=routes[v].len() {
                        let mut trial = routes[v].clone();
                        trial.insert(pos, loc);
                        if let Some(eval) = ctx.simulate(v, &trial) {
                            let delta = eval.cost - if base == i64::MAX { 0 } else { base };
                            if delta <= ctx.request.drop_penalty {
                                routes[v] = trial;
                                inserted = Some(loc);
                                break 'reinsert;
                            }
                        }
                    }
                }
            }
            if let Some(loc) = inserted {
                unrouted.retain(|&l| l != loc);
                improved = true;
            }
        }

        if !improved {
            return;
        }
    }
}

fn extract_response(
    request: &RoutingRequest,
    routes: &[Vec<usize>],
    evals: &[Option<RouteEval>],
    unrouted: &[usize],
    solve_time: f64,
) -> RoutingResponse {
    let empty = RouteEval {
        stops: Vec::new(),
        distance: 0,
        end_time: 0,
        load: 0,
        cost: 0,
    };
    let mut out_routes = Vec::with_capacity(routes.len());
    let mut total_distance = 0_i64;
    let mut total_time = 0_i64;
    let mut total_demand = 0_i64;
    let mut served = 0_usize;

    for (v, route) in routes.iter().enumerate() {
        let veh = &request.vehicles[v];
        let eval = evals[v].as_ref().unwrap_or(&empty);
        let is_used = !route.is_empty();
        let mut stops = Vec::with_capacity(route.len());
        for (idx, &s) in route.iter().enumerate() {
            let loc = &request.locations[s];
            let se = &eval.stops[idx];
            stops.push(RouteStop {
                location_id: loc.location_id.clone(),
                name: loc.name.clone(),
                arrival_time: se.arrival,
                departure_time: se.departure,
                load_after: se.load_after,
                demand_served: loc.demand,
                wait_time: se.wait,
            });
        }
        served += stops.len();

        if is_used {
            total_distance += eval.distance;
            total_time += eval.end_time;
            total_demand += eval.load;
        }
        out_routes.push(VehicleRoute {
            vehicle_id: veh.vehicle_id.clone(),
            name: veh.name.clone(),
            num_stops: stops.len(),
            total_distance: eval.distance,
            total_time: eval.end_time,
            total_load: eval.load,
            is_used,
            stops,
        });
    }

    let dropped: Vec<String> = unrouted
        .iter()
        .map(|&i| request.locations[i].location_id.clone())
        .collect();

    let used: Vec<&VehicleRoute> = out_routes.iter().filter(|r| r.is_used).collect();
    let num_used = used.len();
    let avg_dist = if num_used > 0 {
        total_distance as f64 / num_used as f64
    } else {
        0.0
    };
    let avg_load_pct = if num_used > 0 {
        out_routes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_used)
            .map(|(i, r)| r.total_load as f64 / request.vehicles[i].capacity as f64 * 100.0)
            .sum::<f64>()
            / num_used as f64
    } else {
        0.0
    };

    let metrics = RoutingMetrics {
        total_distance,
        total_time,
        total_demand_served: total_demand,
        vehicles_used: num_used,
        vehicles_available: request.vehicles.len(),
        locations_served: served,
        locations_dropped: dropped.len(),
        dropped_location_ids: dropped.clone(),
        avg_route_distance: round1(avg_dist),
        avg_route_load_pct: round1(avg_load_pct),
        max_route_distance: used.iter().map(|r| r.total_distance).max().unwrap_or(0),
        max_route_time: used.iter().map(|r| r.total_time).max().unwrap_or(0),
        solve_time_seconds: round3(solve_time),
    };

    let status = if dropped.is_empty() {
        SolverStatus::Optimal
    } else {
        SolverStatus::Feasible
    };
    let mut msg_parts = vec![
        format!(
            "{} solution found in {:.2}s.",
            if status == SolverStatus::Optimal {
                "Optimal"
            } else {
                "Feasible"
            },
            solve_time
        ),
        format!("{}/{} vehicles used.", num_used, request.vehicles.len()),
        format!("{} locations served.", served),
        format!("Total distance: {}.", total_distance),
    ];
    if !dropped.is_empty() {
        msg_parts.push(format!("{} locations dropped.", dropped.len()));
    }

    RoutingResponse {
        status,
        message: msg_parts.join(" "),
        routes: out_routes,
        metrics: Some(metrics),
        dropped_locations: dropped,
    }
}
