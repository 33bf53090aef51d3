use bigdecimal::{BigDecimal, ToPrimitive};
use jiff::Zoned;

/// One whole-system reading, recorded once per daytime run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSample {
    pub timestamp: Zoned,
    pub watts: BigDecimal,
}

impl AggregateSample {
    pub fn watts_f64(&self) -> f64 {
        self.watts.to_f64().unwrap_or(0.0)
    }
}

/// Per-string power for one archive slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StringSample {
    pub timestamp: Zoned,
    pub string1: i64,
    pub string2: i64,
}

/// Hours since local midnight, the x coordinate of every chart point.
pub fn hour_of_day(z: &Zoned) -> f64 {
    f64::from(z.hour()) + f64::from(z.minute()) / 60.0 + f64::from(z.second()) / 3600.0
}
