use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Zoned};

/// Zenith of the sun's centre at apparent sunrise/sunset, including refraction.
const ZENITH_DEG: f64 = 90.833;

#[derive(Debug, Clone, PartialEq)]
pub struct SunTimes {
    pub sunrise: Zoned,
    pub sunset: Zoned,
}

/// Sunrise and sunset on `date` at the given location, expressed in `tz`.
///
/// Uses the NOAA general solar position approximation, which stays within a couple of minutes
/// of the almanac at mid latitudes. Polar days clamp to a 24 hour window centred on solar noon;
/// polar nights collapse both instants onto solar noon.
///
/// # Arguments
///
/// * 'date' - civil date of interest
/// * 'tz' - timezone the result is expressed in
/// * 'latitude' - degrees, positive north
/// * 'longitude' - degrees, positive east
pub fn sun_times(
    date: Date,
    tz: &TimeZone,
    latitude: f64,
    longitude: f64,
) -> Result<SunTimes, jiff::Error> {
    let gamma = 2.0 * std::f64::consts::PI / 365.0 * f64::from(date.day_of_year() - 1);

    let eq_time = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());

    let declination = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    let lat = latitude.to_radians();
    let cos_ha = ZENITH_DEG.to_radians().cos() / (lat.cos() * declination.cos())
        - lat.tan() * declination.tan();
    let hour_angle = cos_ha.clamp(-1.0, 1.0).acos().to_degrees();

    // Minutes after UTC midnight
    let sunrise_min = 720.0 - 4.0 * (longitude + hour_angle) - eq_time;
    let sunset_min = 720.0 - 4.0 * (longitude - hour_angle) - eq_time;

    let utc_midnight = date.to_zoned(TimeZone::UTC)?.timestamp();
    let at = |minutes: f64| -> Result<Zoned, jiff::Error> {
        let offset = SignedDuration::from_secs((minutes * 60.0).round() as i64);
        Ok(utc_midnight.checked_add(offset)?.to_zoned(tz.clone()))
    };

    Ok(SunTimes {
        sunrise: at(sunrise_min)?,
        sunset: at(sunset_min)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    const READING: (f64, f64) = (51.4543, -0.9781);

    fn minutes_of_day(z: &Zoned) -> i32 {
        i32::from(z.hour()) * 60 + i32::from(z.minute())
    }

    #[test]
    fn midsummer_in_reading() {
        let tz = TimeZone::get("Europe/London").unwrap();
        let sun = sun_times(date(2021, 6, 21), &tz, READING.0, READING.1).unwrap();

        // Almanac: 04:45 / 21:27 BST
        assert!((4 * 60 + 40..=4 * 60 + 52).contains(&minutes_of_day(&sun.sunrise)));
        assert!((21 * 60 + 18..=21 * 60 + 33).contains(&minutes_of_day(&sun.sunset)));
        assert_eq!(sun.sunrise.date(), date(2021, 6, 21));
    }

    #[test]
    fn midwinter_in_reading() {
        let tz = TimeZone::get("Europe/London").unwrap();
        let sun = sun_times(date(2021, 12, 21), &tz, READING.0, READING.1).unwrap();

        // Almanac: 08:07 / 15:57 GMT
        assert!((8 * 60..=8 * 60 + 14).contains(&minutes_of_day(&sun.sunrise)));
        assert!((15 * 60 + 50..=16 * 60 + 4).contains(&minutes_of_day(&sun.sunset)));
    }

    #[test]
    fn polar_night_never_rises() {
        let sun = sun_times(date(2021, 12, 21), &TimeZone::UTC, 78.2, 15.6).unwrap();
        assert_eq!(sun.sunrise, sun.sunset);
    }
}
