//! Data model for the capacitated vehicle routing family (CVRPTW).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::schedule::default_solve_time;
use crate::{OpsError, OpsResult, SolverStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingObjective {
    MinimizeTotalDistance,
    /// Optimizes the travel-time matrix plus service times.
    MinimizeTotalTime,
    MinimizeVehicles,
    BalanceRoutes,
}

impl Default for RoutingObjective {
    fn default() -> Self {
        RoutingObjective::MinimizeTotalDistance
    }
}

/// A customer stop or the depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub location_id: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Demand units to deliver.
    #[serde(default)]
    pub demand: i64,
    /// Time spent at the location for service.
    #[serde(default)]
    pub service_time: i64,
    /// Earliest arrival time.
    #[serde(default)]
    pub time_window_start: i64,
    /// Latest arrival time. None = open-ended.
    pub time_window_end: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub name: Option<String>,
    /// Maximum load capacity.
    pub capacity: i64,
    pub max_travel_time: Option<i64>,
    pub max_travel_distance: Option<i64>,
    #[serde(default = "default_cost_per_distance")]
    pub cost_per_distance: i64,
    #[serde(default)]
    pub cost_per_time: i64,
    #[serde(default)]
    pub fixed_cost: i64,
}

fn default_cost_per_distance() -> i64 {
    1
}

/// One directed entry of an explicit distance matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceEntry {
    pub from_id: String,
    pub to_id: String,
    pub distance: i64,
    /// Defaults to `distance` when omitted.
    pub travel_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRequest {
    /// Location id of the depot; must appear in `locations`.
    pub depot_id: String,
    pub locations: Vec<Location>,
    pub vehicles: Vec<Vehicle>,
    pub distance_matrix: Option<Vec<DistanceEntry>>,
    #[serde(default)]
    pub objective: RoutingObjective,
    #[serde(default = "default_solve_time")]
    pub max_solve_time_seconds: i64,
    /// Allow skipping locations that cannot be served, at `drop_penalty`.
    #[serde(default)]
    pub allow_drop_visits: bool,
    #[serde(default = "default_drop_penalty")]
    pub drop_penalty: i64,
}

fn default_drop_penalty() -> i64 {
    10_000
}

impl RoutingRequest {
    pub fn validate(&self) -> OpsResult<()> {
        if self.locations.is_empty() || self.locations.len() > 1000 {
            return Err(OpsError::Validation(format!(
                "locations must contain 1..=1000 entries, got {}",
                self.locations.len()
            )));
        }
        if self.vehicles.is_empty() || self.vehicles.len() > 100 {
            return Err(OpsError::Validation(format!(
                "vehicles must contain 1..=100 entries, got {}",
                self.vehicles.len()
            )));
        }
        if !(1..=300).contains(&self.max_solve_time_seconds) {
            return Err(OpsError::Validation(format!(
                "max_solve_time_seconds must be in 1..=300, got {}",
                self.max_solve_time_seconds
            )));
        }
        if self.drop_penalty < 0 {
            return Err(OpsError::Validation("drop_penalty must be >= 0".into()));
        }
        let mut loc_ids = HashSet::new();
        for loc in &self.locations {
            if !loc_ids.insert(loc.location_id.as_str()) {
                return Err(OpsError::Validation(format!(
                    "duplicate location_id '{}'",
                    loc.location_id
                )));
            }
            if loc.demand < 0 || loc.service_time < 0 || loc.time_window_start < 0 {
                return Err(OpsError::Validation(format!(
                    "location '{}' demand/service/window fields must be >= 0",
                    loc.location_id
                )));
            }
            if let Some(lat) = loc.latitude {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(OpsError::Validation(format!(
                        "location '{}' latitude out of range",
                        loc.location_id
                    )));
                }
            }
            if let Some(lon) = loc.longitude {
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(OpsError::Validation(format!(
                        "location '{}' longitude out of range",
                        loc.location_id
                    )));
                }
            }
        }
        let mut veh_ids = HashSet::new();
        for v in &self.vehicles {
            if !veh_ids.insert(v.vehicle_id.as_str()) {
                return Err(OpsError::Validation(format!(
                    "duplicate vehicle_id '{}'",
                    v.vehicle_id
                )));
            }
            if v.capacity <= 0 {
                return Err(OpsError::Validation(format!(
                    "vehicle '{}' capacity must be > 0",
                    v.vehicle_id
                )));
            }
        }
        Ok(())
    }
}

/// One serviced stop along a route (never the depot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub location_id: String,
    pub name: Option<String>,
    pub arrival_time: i64,
    pub departure_time: i64,
    /// Cumulative load after servicing this stop.
    pub load_after: i64,
    #[serde(default)]
    pub demand_served: i64,
    #[serde(default)]
    pub wait_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRoute {
    pub vehicle_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub stops: Vec<RouteStop>,
    pub total_distance: i64,
    pub total_time: i64,
    pub total_load: i64,
    pub num_stops: usize,
    pub is_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingMetrics {
    pub total_distance: i64,
    pub total_time: i64,
    pub total_demand_served: i64,
    pub vehicles_used: usize,
    pub vehicles_available: usize,
    pub locations_served: usize,
    pub locations_dropped: usize,
    #[serde(default)]
    pub dropped_location_ids: Vec<String>,
    pub avg_route_distance: f64,
    pub avg_route_load_pct: f64,
    pub max_route_distance: i64,
    pub max_route_time: i64,
    pub solve_time_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingResponse {
    pub status: SolverStatus,
    pub message: String,
    #[serde(default)]
    pub routes: Vec<VehicleRoute>,
    pub metrics: Option<RoutingMetrics>,
    #[serde(default)]
    pub dropped_locations: Vec<String>,
}

impl RoutingResponse {
    pub fn failed(status: SolverStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            routes: Vec::new(),
            metrics: None,
            dropped_locations: Vec::new(),
        }
    }
}
