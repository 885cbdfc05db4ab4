//! Device taxonomy and registry
//!
//! Every sensor on the account reports on the same cloud topic, so
//! the registry is what lets the agent put a name and a kind next to
//! an incoming device id. It is read-only after startup.

use std::collections::HashMap;
use std::fmt;

/// Sensor families the agent understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Door,
    Temperature,
    Leak,
    Vibration,
}

impl DeviceKind {
    /// Map the vendor's type string
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "DoorSensor" => Some(DeviceKind::Door),
            "THSensor" => Some(DeviceKind::Temperature),
            "LeakSensor" => Some(DeviceKind::Leak),
            "VibrationSensor" => Some(DeviceKind::Vibration),
            _ => None,
        }
    }

    /// Short human-readable state summary for a log line, pulled out
    /// of an event's `data` object
    pub fn summarize(&self, data: &serde_json::Value) -> Option<String> {
        let state = data.get("state").and_then(|v| v.as_str());
        match self {
            DeviceKind::Door => {
                DoorState::parse(state?).map(|s| s.to_string())
            }
            DeviceKind::Leak => {
                LeakState::parse(state?).map(|s| s.to_string())
            }
            DeviceKind::Vibration => {
                VibrationState::parse(state?).map(|s| s.to_string())
            }
            DeviceKind::Temperature => {
                // Readings arrive in Celsius; report Fahrenheit, and
                // humidity when the sensor includes it
                let fahrenheit = data
                    .get("temperature")
                    .and_then(|v| v.as_f64())
                    .map(|t| t * 1.8 + 32.0)?;
                let summary = match data.get("humidity").and_then(|v| v.as_f64()) {
                    Some(humidity) => format!("{fahrenheit:.2}F {humidity:.2}%"),
                    None => format!("{fahrenheit:.2}F"),
                };
                Some(summary)
            }
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Door => "door sensor",
            DeviceKind::Temperature => "temperature sensor",
            DeviceKind::Leak => "leak sensor",
            DeviceKind::Vibration => "vibration sensor",
        };
        write!(f, "{name}")
    }
}

/// Door sensor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
}

impl DoorState {
    pub fn parse(state: &str) -> Option<Self> {
        match state {
            "open" => Some(DoorState::Open),
            "closed" => Some(DoorState::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorState::Open => write!(f, "open"),
            DoorState::Closed => write!(f, "closed"),
        }
    }
}

/// Leak sensor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakState {
    Dry,
    Full,
}

impl LeakState {
    pub fn parse(state: &str) -> Option<Self> {
        match state {
            "dry" => Some(LeakState::Dry),
            "full" => Some(LeakState::Full),
            _ => None,
        }
    }
}

impl fmt::Display for LeakState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeakState::Dry => write!(f, "dry"),
            LeakState::Full => write!(f, "full"),
        }
    }
}

/// Vibration sensor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VibrationState {
    Vibrating,
    Still,
}

impl VibrationState {
    pub fn parse(state: &str) -> Option<Self> {
        match state {
            // Live alerts carry `alert`; `vibrate` is the legacy
            // spelling in the vendor's state table
            "alert" | "vibrate" => Some(VibrationState::Vibrating),
            "normal" => Some(VibrationState::Still),
            _ => None,
        }
    }
}

impl fmt::Display for VibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VibrationState::Vibrating => write!(f, "vibrating"),
            VibrationState::Still => write!(f, "still"),
        }
    }
}

/// One enabled sensor, as returned by the device API
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device_id: String,
    pub name: String,
    /// `None` when the vendor reports a type this agent has no
    /// special handling for; the record is still usable for display
    pub kind: Option<DeviceKind>,
    pub raw_type: String,
    pub token: String,
}

/// Devices keyed by the id events carry
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    by_id: HashMap<String, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: DeviceRecord) {
        self.by_id.insert(record.device_id.clone(), record);
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.by_id.get(device_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_raw() {
        assert_eq!(DeviceKind::from_raw("DoorSensor"), Some(DeviceKind::Door));
        assert_eq!(DeviceKind::from_raw("THSensor"), Some(DeviceKind::Temperature));
        assert_eq!(DeviceKind::from_raw("LeakSensor"), Some(DeviceKind::Leak));
        assert_eq!(
            DeviceKind::from_raw("VibrationSensor"),
            Some(DeviceKind::Vibration)
        );
        assert_eq!(DeviceKind::from_raw("Hub"), None);
    }

    #[test]
    fn test_door_summary() {
        let kind = DeviceKind::Door;
        assert_eq!(
            kind.summarize(&json!({"state": "open"})).as_deref(),
            Some("open")
        );
        assert_eq!(
            kind.summarize(&json!({"state": "closed"})).as_deref(),
            Some("closed")
        );
        assert_eq!(kind.summarize(&json!({"state": "ajar"})), None);
        assert_eq!(kind.summarize(&json!({})), None);
    }

    #[test]
    fn test_temperature_summary_is_fahrenheit() {
        let kind = DeviceKind::Temperature;
        // 21.5C -> 70.7F
        assert_eq!(
            kind.summarize(&json!({"temperature": 21.5})).as_deref(),
            Some("70.70F")
        );
        assert_eq!(
            kind.summarize(&json!({"temperature": 21.5, "humidity": 45.3}))
                .as_deref(),
            Some("70.70F 45.30%")
        );
        assert_eq!(kind.summarize(&json!({"state": "normal"})), None);
    }

    #[test]
    fn test_leak_summary() {
        let kind = DeviceKind::Leak;
        assert_eq!(
            kind.summarize(&json!({"state": "dry"})).as_deref(),
            Some("dry")
        );
        assert_eq!(
            kind.summarize(&json!({"state": "full"})).as_deref(),
            Some("full")
        );
        assert_eq!(kind.summarize(&json!({"state": "damp"})), None);
    }

    #[test]
    fn test_vibration_summary() {
        let kind = DeviceKind::Vibration;
        // Live alerts report `alert`, not the state-table spelling
        assert_eq!(
            kind.summarize(&json!({"state": "alert"})).as_deref(),
            Some("vibrating")
        );
        assert_eq!(
            kind.summarize(&json!({"state": "vibrate"})).as_deref(),
            Some("vibrating")
        );
        assert_eq!(
            kind.summarize(&json!({"state": "normal"})).as_deref(),
            Some("still")
        );
        assert_eq!(kind.summarize(&json!({})), None);
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.is_empty());

        registry.insert(DeviceRecord {
            device_id: "d88b4c0100001234".to_string(),
            name: "Front Door".to_string(),
            kind: Some(DeviceKind::Door),
            raw_type: "DoorSensor".to_string(),
            token: "tok".to_string(),
        });

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("d88b4c0100001234").map(|d| d.name.as_str()),
            Some("Front Door")
        );
        assert!(registry.get("unknown").is_none());
    }
}
