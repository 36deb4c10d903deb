//! Safety-sign vocabulary and enforcement classification.
//!
//! The navigation process reports the upcoming road sign as a numeric code. Most
//! codes are purely informational (curves, bumps, school zones); a small closed set
//! identifies enforcement cameras, which downstream consumers flag differently.
//!
//! # Example
//!
//! ```rust
//! use navi_core::sign::{classify, SafetySign};
//!
//! assert!(classify(SafetySign::SignalCamera.code(), 500.0));
//! assert!(!classify(SafetySign::SpeedBump.code(), 50.0));
//! // Section enforcement only counts while inside the monitored interval.
//! assert!(classify(165, 799.0));
//! assert!(!classify(165, 800.0));
//! ```

use serde::{Deserialize, Serialize};

/// Distance below which a section-speed enforcement sign counts as active.
pub const SECTION_ENFORCEMENT_RANGE_M: f32 = 800.0;

/// Closed vocabulary of sign codes emitted by the navigation process.
///
/// Upstream assigns code 129 to both "parking crackdown" and "no-parking zone";
/// both meanings map to [`SafetySign::NoParking`] and classify identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SafetySign {
    /// Sharp curve to the right.
    CurveRight = 111,
    /// Sharp curve to the left.
    CurveLeft = 112,
    /// Winding road.
    BendRoad = 113,
    /// School zone (first variant).
    SchoolZone = 118,
    /// Road narrows.
    NarrowRoad = 122,
    /// Railroad crossing.
    Railroad = 123,
    /// Speed bump.
    SpeedBump = 124,
    /// School zone (second variant).
    SchoolZoneAlt = 127,
    /// Parking crackdown / no-parking zone.
    NoParking = 129,
    /// Red-light and speed camera.
    SignalCamera = 131,
    /// Fixed speed camera.
    FixedCamera = 135,
    /// Police mobile unit.
    PoliceMobile = 150,
    /// Section (average speed) enforcement.
    SectionEnforcement = 165,
    /// Variable speed-limit section.
    VariableSection = 195,
    /// No lane change zone begins.
    LaneChangeBanStart = 198,
    /// No lane change zone ends.
    LaneChangeBanEnd = 199,
    /// Section enforcement marker (fixed or mobile).
    SectionMarker = 200,
    /// Combined camera enforcement.
    CombinedCamera = 231,
    /// Bus lane enforcement.
    BusOnly = 246,
    /// Overload enforcement.
    LoadOver = 247,
    /// Traffic information collection point.
    TrafficInfo = 248,
    /// No overtaking zone.
    NoOvertaking = 249,
    /// Hard shoulder enforcement.
    Shoulder = 250,
    /// Poorly secured load enforcement.
    LoadPoor = 251,
}

impl SafetySign {
    /// Look up a sign by its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        use SafetySign::*;
        let sign = match code {
            111 => CurveRight,
            112 => CurveLeft,
            113 => BendRoad,
            118 => SchoolZone,
            122 => NarrowRoad,
            123 => Railroad,
            124 => SpeedBump,
            127 => SchoolZoneAlt,
            129 => NoParking,
            131 => SignalCamera,
            135 => FixedCamera,
            150 => PoliceMobile,
            165 => SectionEnforcement,
            195 => VariableSection,
            198 => LaneChangeBanStart,
            199 => LaneChangeBanEnd,
            200 => SectionMarker,
            231 => CombinedCamera,
            246 => BusOnly,
            247 => LoadOver,
            248 => TrafficInfo,
            249 => NoOvertaking,
            250 => Shoulder,
            251 => LoadPoor,
            _ => return None,
        };
        Some(sign)
    }

    /// Numeric code as reported on the wire.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Short human-readable label, used in diagnostics.
    pub fn label(self) -> &'static str {
        use SafetySign::*;
        match self {
            CurveRight => "curve right",
            CurveLeft => "curve left",
            BendRoad => "winding road",
            SchoolZone | SchoolZoneAlt => "school zone",
            NarrowRoad => "narrow road",
            Railroad => "railroad crossing",
            SpeedBump => "speed bump",
            NoParking => "no parking",
            SignalCamera => "signal camera",
            FixedCamera => "fixed camera",
            PoliceMobile => "police mobile",
            SectionEnforcement => "section enforcement",
            VariableSection => "variable section",
            LaneChangeBanStart => "no lane change start",
            LaneChangeBanEnd => "no lane change end",
            SectionMarker => "section marker",
            CombinedCamera => "camera",
            BusOnly => "bus lane",
            LoadOver => "overload",
            TrafficInfo => "traffic info",
            NoOvertaking => "no overtaking",
            Shoulder => "shoulder",
            LoadPoor => "poor load",
        }
    }
}

impl std::fmt::Display for SafetySign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Returns true when the sign is an enforcement camera the driver should be warned about.
///
/// Unknown codes classify as false.
pub fn classify(sign_code: i32, distance_m: f32) -> bool {
    classify_with_range(sign_code, distance_m, SECTION_ENFORCEMENT_RANGE_M)
}

/// [`classify`] with an explicit section-enforcement range.
pub fn classify_with_range(sign_code: i32, distance_m: f32, section_range_m: f32) -> bool {
    match SafetySign::from_code(sign_code) {
        Some(
            SafetySign::SignalCamera
            | SafetySign::FixedCamera
            | SafetySign::PoliceMobile
            | SafetySign::SectionMarker
            | SafetySign::CombinedCamera
            | SafetySign::TrafficInfo,
        ) => true,
        Some(SafetySign::SectionEnforcement) => distance_m < section_range_m,
        _ => false,
    }
}

/// Outbound camera classification (0 = none, 1 = enforcement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TrafficType {
    /// No enforcement ahead.
    #[default]
    None,
    /// Enforcement camera or active section ahead.
    Enforcement,
}

impl From<bool> for TrafficType {
    fn from(enforcement: bool) -> Self {
        if enforcement {
            TrafficType::Enforcement
        } else {
            TrafficType::None
        }
    }
}

impl From<TrafficType> for u8 {
    fn from(value: TrafficType) -> Self {
        match value {
            TrafficType::None => 0,
            TrafficType::Enforcement => 1,
        }
    }
}

impl TryFrom<u8> for TrafficType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TrafficType::None),
            1 => Ok(TrafficType::Enforcement),
            other => Err(format!("invalid traffic type {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENFORCEMENT: [i32; 6] = [131, 135, 150, 200, 231, 248];

    #[test]
    fn test_enforcement_set_ignores_distance() {
        for code in ENFORCEMENT {
            for distance in [0.0, 10.0, 799.0, 800.0, 5000.0, -1.0] {
                assert!(classify(code, distance), "code {code} at {distance}");
            }
        }
    }

    #[test]
    fn test_section_enforcement_threshold() {
        assert!(classify(165, 0.0));
        assert!(classify(165, 799.9));
        assert!(!classify(165, 800.0));
        assert!(!classify(165, 1200.0));
    }

    #[test]
    fn test_informational_and_unknown_codes() {
        for code in [111, 112, 113, 118, 122, 123, 124, 127, 129, 195, 198, 246, 251] {
            assert!(!classify(code, 100.0), "code {code}");
        }
        for code in [0, -5, 1, 130, 999, i32::MAX] {
            assert!(!classify(code, 100.0), "code {code}");
        }
    }

    #[test]
    fn test_code_lookup_covers_vocabulary() {
        for code in [
            111, 112, 113, 118, 122, 123, 124, 127, 129, 131, 135, 150, 165, 195, 198, 199,
            200, 231, 246, 247, 248, 249, 250, 251,
        ] {
            let sign = SafetySign::from_code(code).expect("known code");
            assert_eq!(sign.code(), code);
        }
        assert_eq!(SafetySign::from_code(130), None);
    }

    #[test]
    fn test_traffic_type_serializes_as_integer() {
        let json = serde_json::to_string(&TrafficType::Enforcement).unwrap();
        assert_eq!(json, "1");
        let back: TrafficType = serde_json::from_str("0").unwrap();
        assert_eq!(back, TrafficType::None);
        assert!(serde_json::from_str::<TrafficType>("2").is_err());
    }
}
