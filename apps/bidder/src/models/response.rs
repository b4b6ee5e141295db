//! Outbound auction response wire types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bid {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Impression this bid is for.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub impid: String,
    /// Bid price in CPM dollars.
    pub price: f64,
    /// Winning campaign id, decimal string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adomain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatBid {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bid: Vec<Bid>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub seat: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BidResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bidid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cur: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seatbid: Vec<SeatBid>,
}
