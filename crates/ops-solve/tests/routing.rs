//! Routing solver tests

use ops_core::routing::{
    DistanceEntry, Location, RoutingObjective, RoutingRequest, Vehicle,
};
use ops_core::SolverStatus;
use ops_solve::solve_routing;

fn location(id: &str, demand: i64) -> Location {
    Location {
        location_id: id.to_string(),
        name: None,
        latitude: None,
        longitude: None,
        demand,
        service_time: 0,
        time_window_start: 0,
        time_window_end: None,
    }
}

fn vehicle(id: &str, capacity: i64) -> Vehicle {
    Vehicle {
        vehicle_id: id.to_string(),
        name: None,
        capacity,
        max_travel_time: None,
        max_travel_distance: None,
        cost_per_distance: 1,
        cost_per_time: 0,
        fixed_cost: 0,
    }
}

fn entry(from: &str, to: &str, distance: i64) -> DistanceEntry {
    DistanceEntry {
        from_id: from.to_string(),
        to_id: to.to_string(),
        distance,
        travel_time: None,
    }
}

fn symmetric_matrix(edges: &[(&str, &str, i64)]) -> Vec<DistanceEntry> {
    let mut out = Vec::new();
    for &(a, b, d) in edges {
        out.push(entry(a, b, d));
        out.push(entry(b, a, d));
    }
    out
}

fn small_request() -> RoutingRequest {
    RoutingRequest {
        depot_id: "depot".to_string(),
        locations: vec![location("depot", 0), location("A", 3), location("B", 4)],
        vehicles: vec![vehicle("V1", 10)],
        distance_matrix: Some(symmetric_matrix(&[
            ("depot", "A", 10),
            ("depot", "B", 20),
            ("A", "B", 15),
        ])),
        objective: RoutingObjective::MinimizeTotalDistance,
        max_solve_time_seconds: 5,
        allow_drop_visits: false,
        drop_penalty: 10_000,
    }
}

#[test]
fn test_all_locations_served() {
    let resp = solve_routing(&small_request());
    assert_eq!(resp.status, SolverStatus::Optimal, "{}", resp.message);
    let metrics = resp.metrics.expect("metrics");
    assert_eq!(metrics.locations_served, 2);
    assert_eq!(metrics.locations_dropped, 0);
    assert_eq!(metrics.vehicles_used, 1);
    // depot -> one stop -> other stop -> depot over the triangle.
    assert_eq!(metrics.total_distance, 45);
}

#[test]
fn test_capacity_never_exceeded() {
    let mut request = small_request();
    request.vehicles = vec![vehicle("V1", 4), vehicle("V2", 4)];
    let resp = solve_routing(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    for (route, veh) in resp.routes.iter().zip(request.vehicles.iter()) {
        assert!(
            route.total_load <= veh.capacity,
            "route load {} exceeds capacity {}",
            route.total_load,
            veh.capacity
        );
        for stop in &route.stops {
            assert!(stop.load_after <= veh.capacity);
        }
    }
}

#[test]
fn test_unknown_depot_is_error() {
    let mut request = small_request();
    request.depot_id = "nowhere".to_string();
    let resp = solve_routing(&request);
    assert_eq!(resp.status, SolverStatus::Error);
    assert!(resp.message.contains("nowhere"));
}

#[test]
fn test_undeliverable_demand_without_drops_is_no_solution() {
    let mut request = small_request();
    request.vehicles = vec![vehicle("V1", 2)]; // both demands exceed capacity together
    request.locations[1].demand = 3;
    request.locations[2].demand = 3;
    let resp = solve_routing(&request);
    assert_eq!(resp.status, SolverStatus::NoSolution, "{}", resp.message);
    assert!(resp.message.contains("allow_drop_visits"));
}

#[test]
fn test_drop_visits_keeps_rest_of_plan() {
    let mut request = small_request();
    request.vehicles = vec![vehicle("V1", 3)];
    request.allow_drop_visits = true;
    let resp = solve_routing(&request);
    assert_eq!(resp.status, SolverStatus::Feasible, "{}", resp.message);
    let metrics = resp.metrics.expect("metrics");
    assert_eq!(metrics.locations_served, 1);
    assert_eq!(metrics.locations_dropped, 1);
    assert_eq!(resp.dropped_locations, vec!["B".to_string()]);
}

#[test]
fn test_time_windows_and_waiting() {
    let mut request = small_request();
    // A's window opens well after the vehicle could arrive.
    request.locations[1].time_window_start = 50;
    request.locations[1].service_time = 5;
    let resp = solve_routing(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    let route = resp.routes.iter().find(|r| r.is_used).expect("used route");
    let stop_a = route
        .stops
        .iter()
        .find(|s| s.location_id == "A")
        .expect("A served");
    assert!(stop_a.arrival_time < 50);
    assert_eq!(stop_a.wait_time, 50 - stop_a.arrival_time);
    assert_eq!(
        stop_a.departure_time,
        stop_a.arrival_time + stop_a.wait_time + 5
    );
}

#[test]
fn test_closed_window_forces_order() {
    let mut request = small_request();
    // B must be reached within 25 time units; going via A (10+15) arrives at
    // exactly 25, going direct arrives at 20. Either way B is served.
    request.locations[2].time_window_end = Some(25);
    let resp = solve_routing(&request);
    assert_eq!(resp.status, SolverStatus::Optimal, "{}", resp.message);
    let route = &resp.routes[0];
    let stop_b = route.stops.iter().find(|s| s.location_id == "B").unwrap();
    assert!(stop_b.arrival_time <= 25);
}

#[test]
fn test_minimize_vehicles_consolidates() {
    let mut request = small_request();
    request.vehicles = vec![vehicle("V1", 10), vehicle("V2", 10)];
    request.objective = RoutingObjective::MinimizeVehicles;
    let resp = solve_routing(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    assert_eq!(
        resp.metrics.unwrap().vehicles_used,
        1,
        "one vehicle suffices for 7 units of demand"
    );
}

#[test]
fn test_total_time_objective_uses_time_matrix() {
    let mut request = small_request();
    // Distance says depot->A->B->depot is cheapest; travel times invert that.
    let mut matrix = Vec::new();
    for e in symmetric_matrix(&[("depot", "A", 10), ("depot", "B", 20), ("A", "B", 15)]) {
        matrix.push(e);
    }
    for e in &mut matrix {
        // Slow road between depot and A.
        e.travel_time = Some(if (e.from_id == "depot" && e.to_id == "A")
            || (e.from_id == "A" && e.to_id == "depot")
        {
            100
        } else {
            e.distance
        });
    }
    request.distance_matrix = Some(matrix);
    request.objective = RoutingObjective::MinimizeTotalTime;
    let resp = solve_routing(&request);
    assert!(resp.status.is_feasible(), "{}", resp.message);
    let route = &resp.routes[0];
    // Serving A still costs one slow leg; the plan should not take it twice.
    assert!(route.total_time < 200, "time-optimized plan, got {}", route.total_time);
}

#[test]
fn test_route_accounting_is_consistent() {
    let resp = solve_routing(&small_request());
    let route = &resp.routes[0];
    assert_eq!(route.num_stops, route.stops.len());
    assert_eq!(
        route.total_load,
        route.stops.iter().map(|s| s.demand_served).sum::<i64>()
    );
    for stop in &route.stops {
        assert!(stop.arrival_time <= stop.departure_time);
    }
}
