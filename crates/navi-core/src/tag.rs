//! Tag vocabulary and payload parsing.
//!
//! The navigation process logs one value per line under a fixed tag. Matching is exact
//! and case-sensitive; anything outside the vocabulary is not ours.

use serde::{Deserialize, Serialize};

/// Recognized navigation log tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NaviTag {
    /// Distance to the upcoming sign, metres.
    SpeedLimitDistance,
    /// Posted speed limit.
    SpeedLimit,
    /// Road curvature metric.
    Curvature,
    /// Safety sign code; re-triggers the visibility window.
    SignType,
    /// Turn-by-turn guidance code.
    TurnInfo,
    /// Distance to the next turn.
    DistanceToTurn,
}

impl NaviTag {
    /// Every tag, in dispatch order.
    pub const ALL: [NaviTag; 6] = [
        NaviTag::SpeedLimitDistance,
        NaviTag::SpeedLimit,
        NaviTag::Curvature,
        NaviTag::SignType,
        NaviTag::TurnInfo,
        NaviTag::DistanceToTurn,
    ];

    /// Match a raw log tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "opkrspddist" => Some(NaviTag::SpeedLimitDistance),
            "opkrspdlimit" => Some(NaviTag::SpeedLimit),
            "opkrcurvangle" => Some(NaviTag::Curvature),
            "opkrsigntype" => Some(NaviTag::SignType),
            "opkrturninfo" => Some(NaviTag::TurnInfo),
            "opkrdistancetoturn" => Some(NaviTag::DistanceToTurn),
            _ => None,
        }
    }

    /// The raw tag string.
    pub fn as_str(self) -> &'static str {
        match self {
            NaviTag::SpeedLimitDistance => "opkrspddist",
            NaviTag::SpeedLimit => "opkrspdlimit",
            NaviTag::Curvature => "opkrcurvangle",
            NaviTag::SignType => "opkrsigntype",
            NaviTag::TurnInfo => "opkrturninfo",
            NaviTag::DistanceToTurn => "opkrdistancetoturn",
        }
    }
}

impl std::fmt::Display for NaviTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a payload that carries no leading integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadPolicy {
    /// Treat it as 0, matching the navigation process' own `atoi` reading.
    #[default]
    Zero,
    /// Leave the field untouched and do not re-trigger the event.
    Skip,
}

impl PayloadPolicy {
    /// Resolve a payload to the value to store, or `None` to drop the update.
    pub fn resolve(self, payload: &str) -> Option<i64> {
        match (parse_payload(payload), self) {
            (Some(value), _) => Some(value),
            (None, PayloadPolicy::Zero) => Some(0),
            (None, PayloadPolicy::Skip) => None,
        }
    }
}

/// Parse the leading integer of a payload.
///
/// Accepts leading whitespace, an optional sign and as many digits as follow; trailing
/// text is ignored (`"500m"` is 500). Returns `None` when no digit leads the payload.
/// Values beyond `i64` saturate.
pub fn parse_payload(payload: &str) -> Option<i64> {
    let s = payload.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    let mut seen = false;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        seen = true;
        let digit = i64::from(b - b'0');
        value = value.saturating_mul(10);
        value = if negative {
            value.saturating_sub(digit)
        } else {
            value.saturating_add(digit)
        };
    }

    seen.then_some(value)
}
