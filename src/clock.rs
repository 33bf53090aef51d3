use crate::config::Config;
use crate::sun::{SunTimes, sun_times};
use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};

/// The single notion of "now" for a run, with the day's sun times resolved in the local zone.
#[derive(Debug, Clone)]
pub struct TimeContext {
    pub now: Zoned,
    pub today: Date,
    pub sunrise: Zoned,
    pub sunset: Zoned,
}

impl TimeContext {
    /// Reads the system clock. Call once per run.
    pub fn current(config: &Config) -> Result<Self, jiff::Error> {
        let tz = TimeZone::get(&config.timezone)?;
        Self::at(Timestamp::now().to_zoned(tz), config)
    }

    pub fn at(now: Zoned, config: &Config) -> Result<Self, jiff::Error> {
        let today = now.date();
        let SunTimes { sunrise, sunset } = sun_times(
            today,
            now.time_zone(),
            config.site.latitude,
            config.site.longitude,
        )?;
        Ok(Self {
            now,
            today,
            sunrise,
            sunset,
        })
    }

    pub fn tz(&self) -> &TimeZone {
        self.now.time_zone()
    }

    /// Strictly between sunrise and sunset.
    pub fn is_daylight(&self) -> bool {
        self.now.timestamp() > self.sunrise.timestamp()
            && self.now.timestamp() < self.sunset.timestamp()
    }

    pub fn is_after_sunset(&self) -> bool {
        self.now.timestamp() > self.sunset.timestamp()
    }

    /// Timestamp text written to CSV rows, e.g. `2021-09-11T13:05:00+01:00`.
    pub fn now_iso(&self) -> String {
        iso(&self.now)
    }

    /// Date used in file names, e.g. `2021-09-11`.
    pub fn day(&self) -> String {
        self.today.to_string()
    }
}

pub fn iso(z: &Zoned) -> String {
    z.strftime("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn context(hour: i8, minute: i8) -> TimeContext {
        let config = Config::deployment();
        let tz = TimeZone::get(&config.timezone).unwrap();
        let now = date(2021, 6, 21).at(hour, minute, 0, 0).to_zoned(tz).unwrap();
        TimeContext::at(now, &config).unwrap()
    }

    #[test]
    fn classifies_daylight() {
        assert!(!context(3, 0).is_daylight());
        assert!(context(12, 0).is_daylight());
        assert!(!context(12, 0).is_after_sunset());
        assert!(!context(22, 30).is_daylight());
        assert!(context(22, 30).is_after_sunset());
    }

    #[test]
    fn iso_timestamp_carries_the_local_offset() {
        let ctx = context(13, 5);
        assert_eq!(ctx.now_iso(), "2021-06-21T13:05:00+01:00");
        assert_eq!(ctx.day(), "2021-06-21");
    }
}
