use serde::Deserialize;
use serde_json::Number;
use std::collections::BTreeMap;

pub const DEVICE: &str = "inverter/1";
pub const CURRENT_STRING_1: &str = "Current_DC_String_1";
pub const VOLTAGE_STRING_1: &str = "Voltage_DC_String_1";
pub const CURRENT_STRING_2: &str = "Current_DC_String_2";
pub const VOLTAGE_STRING_2: &str = "Voltage_DC_String_2";

/// `GetInverterRealtimeData.cgi?Scope=System`
#[derive(Debug, Deserialize)]
pub struct RealtimeDocument {
    #[serde(rename = "Body")]
    pub body: RealtimeBody,
}

#[derive(Debug, Deserialize)]
pub struct RealtimeBody {
    #[serde(rename = "Data")]
    pub data: RealtimeData,
}

#[derive(Debug, Deserialize)]
pub struct RealtimeData {
    /// AC power, keyed by device id; "1" is the system total.
    #[serde(rename = "PAC")]
    pub pac: Reading<String, Number>,
}

/// `GetArchiveData.cgi?Scope=System`
#[derive(Debug, Deserialize)]
pub struct ArchiveDocument {
    #[serde(rename = "Body")]
    pub body: ArchiveBody,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveBody {
    #[serde(rename = "Data")]
    pub data: BTreeMap<String, ArchiveDevice>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveDevice {
    #[serde(rename = "Data", default)]
    pub channels: BTreeMap<String, Reading<u32, f64>>,
}

/// A channel's values; archive channels are keyed by seconds since local midnight.
#[derive(Debug, Deserialize)]
pub struct Reading<K: Ord, V> {
    #[serde(rename = "Values")]
    pub values: BTreeMap<K, V>,
}
