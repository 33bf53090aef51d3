use crate::error::ShapeError;
use crate::payload::{
    ArchiveDocument, CURRENT_STRING_1, CURRENT_STRING_2, DEVICE, RealtimeDocument, Reading,
    VOLTAGE_STRING_1, VOLTAGE_STRING_2,
};
use crate::samples::StringSample;
use bigdecimal::BigDecimal;
use jiff::civil::{Date, Time};
use jiff::tz::TimeZone;
use jiff::{ToSpan, Zoned};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Whole-system AC power right now, exactly as the inverter reported it.
pub fn realtime_watts(doc: &Value) -> Result<BigDecimal, ShapeError> {
    let doc = RealtimeDocument::deserialize(doc)?;
    let pac = doc
        .body
        .data
        .pac
        .values
        .get("1")
        .ok_or(ShapeError::MissingPower)?;
    BigDecimal::from_str(&pac.to_string()).map_err(|_| ShapeError::BadPower(pac.to_string()))
}

/// Converts today's archive into per-string watts on local timestamps.
///
/// Current and voltage samples are paired positionally in ascending offset order and multiplied,
/// truncating to whole watts. The first `warmup` aligned slots are dropped; an archive shorter
/// than that yields an empty series.
///
/// # Arguments
///
/// * 'doc' - archive document as returned by the inverter
/// * 'today' - local date the offsets are relative to
/// * 'tz' - local timezone
/// * 'warmup' - number of leading slots to discard
pub fn string_series(
    doc: &Value,
    today: Date,
    tz: &TimeZone,
    warmup: usize,
) -> Result<Vec<StringSample>, ShapeError> {
    let doc = ArchiveDocument::deserialize(doc)?;
    let channels = &doc
        .body
        .data
        .get(DEVICE)
        .ok_or(ShapeError::MissingDevice(DEVICE))?
        .channels;

    let string1 = paired_watts(
        channel(channels, CURRENT_STRING_1)?,
        channel(channels, VOLTAGE_STRING_1)?,
    );
    let string2 = paired_watts(
        channel(channels, CURRENT_STRING_2)?,
        channel(channels, VOLTAGE_STRING_2)?,
    );

    string1
        .into_iter()
        .zip(string2)
        .skip(warmup)
        .map(|((seconds, w1), (_, w2))| -> Result<StringSample, ShapeError> {
            Ok(StringSample {
                timestamp: local_offset(today, tz, seconds)?,
                string1: w1,
                string2: w2,
            })
        })
        .collect()
}

fn channel<'a>(
    channels: &'a BTreeMap<String, Reading<u32, f64>>,
    name: &'static str,
) -> Result<&'a BTreeMap<u32, f64>, ShapeError> {
    channels
        .get(name)
        .map(|r| &r.values)
        .ok_or(ShapeError::MissingChannel(name))
}

/// P = I * V per slot, keyed by the current sample's offset.
fn paired_watts(current: &BTreeMap<u32, f64>, voltage: &BTreeMap<u32, f64>) -> Vec<(u32, i64)> {
    current
        .iter()
        .zip(voltage.values())
        .map(|((&seconds, amps), volts)| (seconds, (amps * volts) as i64))
        .collect()
}

fn local_offset(today: Date, tz: &TimeZone, seconds: u32) -> Result<Zoned, ShapeError> {
    today
        .to_datetime(Time::midnight())
        .checked_add(i64::from(seconds).seconds())
        .and_then(|dt| dt.to_zoned(tz.clone()))
        .map_err(|source| ShapeError::Offset { seconds, source })
}
