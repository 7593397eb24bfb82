//! Data model for the multi-dimensional bin packing family.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::schedule::default_solve_time;
use crate::{OpsError, OpsResult, SolverStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingObjective {
    /// Minimize total cost of used bins.
    MinimizeBins,
    MaximizeValue,
    MaximizeItems,
    /// Minimize the maximum weight-utilization percentage over used bins.
    BalanceLoad,
}

impl Default for PackingObjective {
    fn default() -> Self {
        PackingObjective::MinimizeBins
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub name: Option<String>,
    pub weight: i64,
    /// 0 = ignore volume.
    #[serde(default)]
    pub volume: i64,
    #[serde(default = "default_one")]
    pub value: i64,
    /// Number of copies; each copy becomes a distinct instance.
    #[serde(default = "default_one")]
    pub quantity: i64,
    /// Group label for keeping related items together.
    pub group: Option<String>,
}

fn default_one() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bin {
    pub bin_id: String,
    pub name: Option<String>,
    pub weight_capacity: i64,
    /// 0 = ignore volume.
    #[serde(default)]
    pub volume_capacity: i64,
    /// None = no limit.
    pub max_items: Option<i64>,
    #[serde(default = "default_one")]
    pub cost: i64,
    #[serde(default = "default_one")]
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingRequest {
    pub items: Vec<Item>,
    pub bins: Vec<Bin>,
    #[serde(default)]
    pub objective: PackingObjective,
    #[serde(default = "default_solve_time")]
    pub max_solve_time_seconds: i64,
    /// Allow leaving items unpacked when the bins cannot hold everything.
    #[serde(default)]
    pub allow_partial: bool,
    /// Force all items sharing a group label into one bin.
    #[serde(default)]
    pub keep_groups_together: bool,
}

impl PackingRequest {
    pub fn validate(&self) -> OpsResult<()> {
        if self.items.is_empty() || self.items.len() > 1000 {
            return Err(OpsError::Validation(format!(
                "items must contain 1..=1000 entries, got {}",
                self.items.len()
            )));
        }
        if self.bins.is_empty() || self.bins.len() > 100 {
            return Err(OpsError::Validation(format!(
                "bins must contain 1..=100 entries, got {}",
                self.bins.len()
            )));
        }
        if !(1..=300).contains(&self.max_solve_time_seconds) {
            return Err(OpsError::Validation(format!(
                "max_solve_time_seconds must be in 1..=300, got {}",
                self.max_solve_time_seconds
            )));
        }
        let mut item_ids = HashSet::new();
        for item in &self.items {
            if !item_ids.insert(item.item_id.as_str()) {
                return Err(OpsError::Validation(format!(
                    "duplicate item_id '{}'",
                    item.item_id
                )));
            }
            if item.weight <= 0 {
                return Err(OpsError::Validation(format!(
                    "item '{}' weight must be > 0",
                    item.item_id
                )));
            }
            if item.volume < 0 || item.value < 0 {
                return Err(OpsError::Validation(format!(
                    "item '{}' volume and value must be >= 0",
                    item.item_id
                )));
            }
            if !(1..=1000).contains(&item.quantity) {
                return Err(OpsError::Validation(format!(
                    "item '{}' quantity must be in 1..=1000",
                    item.item_id
                )));
            }
        }
        let mut bin_ids = HashSet::new();
        for b in &self.bins {
            if !bin_ids.insert(b.bin_id.as_str()) {
                return Err(OpsError::Validation(format!(
                    "duplicate bin_id '{}'",
                    b.bin_id
                )));
            }
            if b.weight_capacity <= 0 {
                return Err(OpsError::Validation(format!(
                    "bin '{}' weight_capacity must be > 0",
                    b.bin_id
                )));
            }
            if b.volume_capacity < 0 || b.cost < 0 {
                return Err(OpsError::Validation(format!(
                    "bin '{}' volume_capacity and cost must be >= 0",
                    b.bin_id
                )));
            }
            if !(1..=100).contains(&b.quantity) {
                return Err(OpsError::Validation(format!(
                    "bin '{}' quantity must be in 1..=100",
                    b.bin_id
                )));
            }
            if matches!(b.max_items, Some(m) if m < 1) {
                return Err(OpsError::Validation(format!(
                    "bin '{}' max_items must be >= 1",
                    b.bin_id
                )));
            }
        }
        Ok(())
    }
}

/// One packed item instance. `item_id`/`bin_id` carry the original
/// (pre-expansion) ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackedItem {
    pub item_id: String,
    pub name: Option<String>,
    pub bin_id: String,
    pub bin_name: Option<String>,
    pub weight: i64,
    pub volume: i64,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinSummary {
    pub bin_id: String,
    pub name: Option<String>,
    pub is_used: bool,
    pub items_packed: usize,
    pub weight_used: i64,
    pub weight_capacity: i64,
    pub weight_utilization_pct: f64,
    pub volume_used: i64,
    pub volume_capacity: i64,
    pub volume_utilization_pct: f64,
    pub total_value: i64,
    #[serde(default)]
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingMetrics {
    pub bins_used: usize,
    pub bins_available: usize,
    pub items_packed: usize,
    pub items_unpacked: usize,
    #[serde(default)]
    pub unpacked_item_ids: Vec<String>,
    pub total_value_packed: i64,
    pub total_weight_packed: i64,
    pub total_volume_packed: i64,
    pub avg_weight_utilization_pct: f64,
    pub avg_volume_utilization_pct: f64,
    /// 100 minus the average weight utilization over used bins.
    pub total_waste_pct: f64,
    pub total_bin_cost: i64,
    pub solve_time_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingResponse {
    pub status: SolverStatus,
    pub message: String,
    #[serde(default)]
    pub assignments: Vec<PackedItem>,
    #[serde(default)]
    pub bin_summaries: Vec<BinSummary>,
    pub metrics: Option<PackingMetrics>,
    #[serde(default)]
    pub unpacked_items: Vec<String>,
}

impl PackingResponse {
    pub fn failed(status: SolverStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            assignments: Vec::new(),
            bin_summaries: Vec::new(),
            metrics: None,
            unpacked_items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let req: PackingRequest = serde_json::from_value(serde_json::json!({
            "items": [{"item_id": "box", "weight": 10}],
            "bins": [{"bin_id": "pallet", "weight_capacity": 50}]
        }))
        .unwrap();
        assert_eq!(req.objective, PackingObjective::MinimizeBins);
        assert_eq!(req.items[0].quantity, 1);
        assert_eq!(req.bins[0].cost, 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_quantity_bounds_enforced() {
        let req: PackingRequest = serde_json::from_value(serde_json::json!({
            "items": [{"item_id": "box", "weight": 10, "quantity": 1001}],
            "bins": [{"bin_id": "pallet", "weight_capacity": 50}]
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }
}
