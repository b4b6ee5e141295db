//! Campaign attributes and targeting terms.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::models::money::micro_cents_per_impression;

/// The dimension a campaign targets on.
///
/// The numeric values map to historical log data and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    /// App or site name the impression is served in.
    Placement = 1,
    /// Creative dimensions, formatted as `WxH`.
    CreativeSize = 2,
    /// Country of the requesting device.
    Country = 3,
    /// Operating system of the requesting device.
    Os = 4,
}

impl TargetType {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(TargetType::Placement),
            2 => Some(TargetType::CreativeSize),
            3 => Some(TargetType::Country),
            4 => Some(TargetType::Os),
            _ => None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

impl Serialize for TargetType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for TargetType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        TargetType::from_i64(value)
            .ok_or_else(|| de::Error::custom(format!("unknown target type {value}")))
    }
}

/// One `(type, value)` targeting term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub value: String,
}

impl Target {
    pub fn new(target_type: TargetType, value: impl Into<String>) -> Self {
        Self {
            target_type,
            value: value.into(),
        }
    }
}

/// A campaign as read from the store: an eagerly populated, immutable view.
///
/// The campaign's live balance is not here; it lives in the ledger and is
/// only observable through ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub id: i64,
    pub bid_cpm_micro_cents: i64,
    pub daily_budget_micro_cents: i64,
    /// One value per target type.
    pub targets: HashMap<TargetType, String>,
}

impl Campaign {
    /// What one impression costs this campaign.
    pub fn cost_per_impression(&self) -> i64 {
        micro_cents_per_impression(self.bid_cpm_micro_cents)
    }

    pub fn target_list(&self) -> Vec<Target> {
        self.targets
            .iter()
            .map(|(t, v)| Target::new(*t, v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_type_values_are_stable() {
        assert_eq!(TargetType::Placement.as_i64(), 1);
        assert_eq!(TargetType::CreativeSize.as_i64(), 2);
        assert_eq!(TargetType::Country.as_i64(), 3);
        assert_eq!(TargetType::Os.as_i64(), 4);
    }

    #[test]
    fn target_type_round_trips_through_i64() {
        for raw in 1..=4 {
            let t = TargetType::from_i64(raw).unwrap();
            assert_eq!(t.as_i64(), raw);
        }
        assert!(TargetType::from_i64(0).is_none());
        assert!(TargetType::from_i64(5).is_none());
    }

    #[test]
    fn target_serializes_with_numeric_type() {
        let target = Target::new(TargetType::Country, "US");
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json, serde_json::json!({ "type": 3, "value": "US" }));

        let back: Target = serde_json::from_value(json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn cost_per_impression_divides_cpm() {
        let campaign = Campaign {
            id: 100,
            bid_cpm_micro_cents: 25_000_000,
            daily_budget_micro_cents: 100_000_000,
            targets: HashMap::new(),
        };
        assert_eq!(campaign.cost_per_impression(), 25_000);
    }
}
