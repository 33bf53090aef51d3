use crate::config::Tariff;
use crate::samples::AggregateSample;
use bigdecimal::{BigDecimal, Zero};

/// Aggregate samples recorded per hour of generation.
const SAMPLES_PER_HOUR: u32 = 60;
const WATTS_PER_KW: u32 = 1000;

/// Values written to the summary row when a day is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub kwh: BigDecimal,
    pub peak_watts: BigDecimal,
}

impl DaySummary {
    pub fn from_samples(samples: &[AggregateSample]) -> Self {
        Self {
            kwh: daily_kwh(samples.iter()),
            peak_watts: peak_watts(samples.iter()),
        }
    }
}

/// Energy generated so far today, in kWh rounded to two places.
///
/// Assumes one sample per elapsed minute; missed minutes bias the total low.
pub fn daily_kwh<'a>(samples: impl Iterator<Item = &'a AggregateSample>) -> BigDecimal {
    let total: BigDecimal = samples.map(|s| s.watts.clone()).sum();
    (total / BigDecimal::from(SAMPLES_PER_HOUR * WATTS_PER_KW)).round(2)
}

pub fn peak_watts<'a>(samples: impl Iterator<Item = &'a AggregateSample>) -> BigDecimal {
    samples
        .map(|s| &s.watts)
        .max()
        .cloned()
        .unwrap_or_else(BigDecimal::zero)
}

/// Monetary equivalent of `kwh`, e.g. `£1.23`.
pub fn money_value(kwh: &BigDecimal, tariff: &Tariff) -> String {
    let value = (kwh * &tariff.kwh_value).round(2);
    format!("{}{:.2}", tariff.currency, value)
}
