//! Sidereal time and coordinate formatting helpers

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Julian day for a UTC instant
pub fn julian_day(dt: &DateTime<Utc>) -> f64 {
    let year = dt.year();
    let month = dt.month();
    let day = dt.day();
    let hour = dt.hour();
    let minute = dt.minute();
    let second = dt.second();

    let (y, m) = if month <= 2 {
        (year - 1, month + 12)
    } else {
        (year, month)
    };

    let a = y / 100;
    let b = 2 - a + a / 4;

    let jd = (365.25 * (y as f64 + 4716.0)).floor() + (30.6001 * (m as f64 + 1.0)).floor()
        + day as f64
        + b as f64
        - 1524.5;

    let time_fraction = (hour as f64 + minute as f64 / 60.0 + second as f64 / 3600.0) / 24.0;

    jd + time_fraction
}

/// Local sidereal time in hours for a Julian day and east-positive longitude
pub fn local_sidereal_time(jd: f64, longitude: f64) -> f64 {
    let t = (jd - 2451545.0) / 36525.0;

    // Greenwich Mean Sidereal Time in degrees
    let gmst = 280.46061837 + 360.98564736629 * (jd - 2451545.0) + 0.000387933 * t * t
        - t * t * t / 38710000.0;

    let lst = (gmst + longitude) % 360.0;
    if lst < 0.0 {
        (lst + 360.0) / 15.0
    } else {
        lst / 15.0
    }
}

/// Hour angle of a target, mapped into [-12, 12) hours.
///
/// Negative values are east of the meridian.
pub fn hour_angle(lst_hours: f64, ra_hours: f64) -> f64 {
    let ha = (lst_hours - ra_hours).rem_euclid(24.0);
    ((ha + 36.0) % 24.0) - 12.0
}

/// Right ascension as `HH:MM:SS`
pub fn ra_hms_string(ra_hours: f64) -> String {
    let mut total = (ra_hours.rem_euclid(24.0) * 3600.0).round() as i64;
    total %= 86400;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Declination as `+DD° MM' SS"`
pub fn dec_dms_string(dec_degrees: f64) -> String {
    let sign = if dec_degrees < 0.0 { '-' } else { '+' };
    let total = (dec_degrees.abs() * 3600.0).round() as i64;
    format!(
        "{}{:02}° {:02}' {:02}\"",
        sign,
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn julian_day_at_j2000_epoch() {
        let dt = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((julian_day(&dt) - 2451545.0).abs() < 1e-6);
    }

    #[test]
    fn sidereal_time_at_j2000_greenwich() {
        // GMST at J2000.0 is 18h 41m 50.55s
        let lst = local_sidereal_time(2451545.0, 0.0);
        assert!((lst - 18.697374558).abs() < 1e-3);
    }

    #[test]
    fn sidereal_time_shifts_with_longitude() {
        let greenwich = local_sidereal_time(2451545.0, 0.0);
        let east = local_sidereal_time(2451545.0, 15.0);
        let diff = (east - greenwich + 24.0) % 24.0;
        assert!((diff - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hour_angle_on_meridian_is_zero() {
        assert_eq!(hour_angle(10.0, 10.0), 0.0);
    }

    #[test]
    fn hour_angle_wraps_into_range() {
        // Target 13h east of LST 0h: HA -13 wraps to +11
        assert!((hour_angle(0.0, 13.0) - 11.0).abs() < 1e-9);
        // HA +12 maps onto the -12 end of the range
        assert!((hour_angle(14.0, 2.0) - (-12.0)).abs() < 1e-9);
        // A target just east of the meridian is slightly negative
        assert!((hour_angle(5.0, 5.5) - (-0.5)).abs() < 1e-9);
    }

    #[test]
    fn ra_string_formats_hms() {
        assert_eq!(ra_hms_string(5.575556), "05:34:32");
        assert_eq!(ra_hms_string(0.0), "00:00:00");
        // Rounding up across the 24h boundary wraps to zero
        assert_eq!(ra_hms_string(23.9999999), "00:00:00");
    }

    #[test]
    fn dec_string_formats_dms() {
        assert_eq!(dec_dms_string(22.014444), "+22° 00' 52\"");
        assert_eq!(dec_dms_string(-5.5), "-05° 30' 00\"");
        assert_eq!(dec_dms_string(0.0), "+00° 00' 00\"");
    }
}
