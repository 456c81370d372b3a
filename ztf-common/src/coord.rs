///! Equatorial coordinates (ICRS) and angular separation
///!
///! Remote catalogs return positions in mixed representations: decimal
///! degrees, sexagesimal hour angle ("05 34 31.94") or sexagesimal degrees
///! ("+22 00 52.2"). Everything is reconciled to decimal degrees here before
///! any separation is computed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ARCSEC_PER_DEG: f64 = 3600.0;
const DEG_PER_HOUR: f64 = 15.0;

/// Coordinate errors are hard errors: they are raised before any remote
/// request is dispatched and are never collapsed into "no match".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("right ascension {0} is not a finite number of degrees")]
    InvalidRa(f64),
    #[error("declination {0} is outside [-90, 90] degrees")]
    InvalidDec(f64),
    #[error("search radius {0} arcsec must be positive and finite")]
    InvalidRadius(f64),
    #[error("cannot parse {0:?} as an angle")]
    UnparsableAngle(String),
}

/// Unit of a catalog's native right-ascension column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    Degrees,
    Hours,
}

/// A sky position in the ICRS frame, decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqCoord {
    pub ra: f64,
    pub dec: f64,
}

impl EqCoord {
    /// Validate and build a coordinate. RA is wrapped into [0, 360).
    pub fn new(ra_deg: f64, dec_deg: f64) -> Result<Self, CoordError> {
        if !ra_deg.is_finite() {
            return Err(CoordError::InvalidRa(ra_deg));
        }
        if !dec_deg.is_finite() || !(-90.0..=90.0).contains(&dec_deg) {
            return Err(CoordError::InvalidDec(dec_deg));
        }
        Ok(Self {
            ra: ra_deg.rem_euclid(360.0),
            dec: dec_deg,
        })
    }

    /// Great-circle separation to `other`, in arcseconds.
    pub fn separation_arcsec(&self, other: &EqCoord) -> f64 {
        SeparationFrom::new(self).to_arcsec(other)
    }
}

/// Precomputed trigonometry of a query point, for computing separations to
/// many catalog rows without re-evaluating the query-side sin/cos each time.
#[derive(Debug, Clone, Copy)]
pub struct SeparationFrom {
    ra_rad: f64,
    sin_dec: f64,
    cos_dec: f64,
}

impl SeparationFrom {
    pub fn new(coord: &EqCoord) -> Self {
        let (sin_dec, cos_dec) = coord.dec.to_radians().sin_cos();
        Self {
            ra_rad: coord.ra.to_radians(),
            sin_dec,
            cos_dec,
        }
    }

    /// Vincenty angular separation, accurate at all distances.
    pub fn to_arcsec(&self, other: &EqCoord) -> f64 {
        let (sin_dec2, cos_dec2) = other.dec.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (other.ra.to_radians() - self.ra_rad).sin_cos();

        let num = ((cos_dec2 * sin_dra).powi(2)
            + (self.cos_dec * sin_dec2 - self.sin_dec * cos_dec2 * cos_dra).powi(2))
        .sqrt();
        let den = self.sin_dec * sin_dec2 + self.cos_dec * cos_dec2 * cos_dra;

        num.atan2(den).to_degrees() * ARCSEC_PER_DEG
    }
}

/// A cone-search query: center plus radius in arcseconds.
///
/// Immutable once constructed; invalid input is rejected here so adapters
/// never see a malformed query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConeSearch {
    pub coord: EqCoord,
    pub radius_arcsec: f64,
}

impl ConeSearch {
    pub fn new(ra_deg: f64, dec_deg: f64, radius_arcsec: f64) -> Result<Self, CoordError> {
        if !radius_arcsec.is_finite() || radius_arcsec <= 0.0 {
            return Err(CoordError::InvalidRadius(radius_arcsec));
        }
        Ok(Self {
            coord: EqCoord::new(ra_deg, dec_deg)?,
            radius_arcsec,
        })
    }

    /// Cache key with coordinates rounded to microdegrees (~3.6 mas) and the
    /// radius to milliarcseconds. Queries closer than that are the same query.
    pub fn cache_key(&self) -> ConeSearchKey {
        ConeSearchKey {
            ra_udeg: (self.coord.ra * 1e6).round() as i64,
            dec_udeg: (self.coord.dec * 1e6).round() as i64,
            radius_mas: (self.radius_arcsec * 1e3).round() as i64,
        }
    }
}

/// Hashable fixed-precision form of [`ConeSearch`], used as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConeSearchKey {
    ra_udeg: i64,
    dec_udeg: i64,
    radius_mas: i64,
}

/// Parse an angle that may be decimal ("83.633") or sexagesimal
/// ("05 34 31.94", "5:34:31.94", "-01 12 43.2"), in the given unit, into
/// decimal degrees.
pub fn parse_angle(raw: &str, unit: AngleUnit) -> Result<f64, CoordError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(CoordError::UnparsableAngle(raw.to_string()));
    }
    if let Ok(v) = s.parse::<f64>() {
        return match unit {
            AngleUnit::Degrees => Ok(v),
            AngleUnit::Hours => Ok(v * DEG_PER_HOUR),
        };
    }
    sexagesimal_to_deg(s, unit).ok_or_else(|| CoordError::UnparsableAngle(raw.to_string()))
}

fn sexagesimal_to_deg(s: &str, unit: AngleUnit) -> Option<f64> {
    let (sign, body) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let mut parts = body
        .split(|c: char| c.is_whitespace() || c == ':')
        .filter(|p| !p.is_empty());

    let first: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0.0,
    };
    let seconds: f64 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return None;
    }

    let value = first + minutes / 60.0 + seconds / 3600.0;
    let deg = match unit {
        AngleUnit::Degrees => value,
        AngleUnit::Hours => value * DEG_PER_HOUR,
    };
    Some(sign * deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separation_same_point() {
        let a = EqCoord::new(10.0, 20.0).unwrap();
        assert!(a.separation_arcsec(&a).abs() < 1e-9);
    }

    #[test]
    fn test_separation_quarter_circle() {
        let a = EqCoord::new(0.0, 0.0).unwrap();
        let b = EqCoord::new(90.0, 0.0).unwrap();
        let sep = a.separation_arcsec(&b);
        assert!((sep - 90.0 * 3600.0).abs() < 1e-6);
    }

    #[test]
    fn test_separation_pole_to_equator() {
        let a = EqCoord::new(123.0, 90.0).unwrap();
        let b = EqCoord::new(0.0, 0.0).unwrap();
        assert!((a.separation_arcsec(&b) - 90.0 * 3600.0).abs() < 1e-6);
    }

    #[test]
    fn test_separation_antipodes() {
        let a = EqCoord::new(0.0, 0.0).unwrap();
        let b = EqCoord::new(180.0, 0.0).unwrap();
        assert!((a.separation_arcsec(&b) - 180.0 * 3600.0).abs() < 1e-6);
    }

    #[test]
    fn test_separation_small_angle() {
        // 1 arcsec offset in declination
        let a = EqCoord::new(83.0, 22.0).unwrap();
        let b = EqCoord::new(83.0, 22.0 + 1.0 / 3600.0).unwrap();
        assert!((a.separation_arcsec(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bulk_separation_matches_pairwise() {
        let center = EqCoord::new(30.0, -15.0).unwrap();
        let from = SeparationFrom::new(&center);
        for (ra, dec) in [(30.1, -15.0), (29.9, -14.9), (31.0, -16.0)] {
            let other = EqCoord::new(ra, dec).unwrap();
            let bulk = from.to_arcsec(&other);
            let pair = center.separation_arcsec(&other);
            assert!((bulk - pair).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ra_wraps() {
        let c = EqCoord::new(370.0, 0.0).unwrap();
        assert!((c.ra - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_coords_rejected() {
        assert!(matches!(
            EqCoord::new(f64::NAN, 0.0),
            Err(CoordError::InvalidRa(_))
        ));
        assert!(matches!(
            EqCoord::new(0.0, 91.0),
            Err(CoordError::InvalidDec(_))
        ));
    }

    #[test]
    fn test_cone_search_radius_validation() {
        assert!(matches!(
            ConeSearch::new(10.0, 10.0, 0.0),
            Err(CoordError::InvalidRadius(_))
        ));
        assert!(matches!(
            ConeSearch::new(10.0, 10.0, -1.0),
            Err(CoordError::InvalidRadius(_))
        ));
        assert!(ConeSearch::new(10.0, 10.0, 1.0).is_ok());
    }

    #[test]
    fn test_cache_key_rounds() {
        let a = ConeSearch::new(10.0000001, 20.0, 1.0).unwrap();
        let b = ConeSearch::new(10.0000003, 20.0, 1.0).unwrap();
        let c = ConeSearch::new(10.001, 20.0, 1.0).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_parse_angle_decimal() {
        assert!((parse_angle("83.633", AngleUnit::Degrees).unwrap() - 83.633).abs() < 1e-12);
        assert!((parse_angle("5.5", AngleUnit::Hours).unwrap() - 82.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_angle_sexagesimal_hours() {
        // Crab pulsar: 05h 34m 31.94s = 83.6330833... deg
        let deg = parse_angle("05 34 31.94", AngleUnit::Hours).unwrap();
        assert!((deg - 83.633_083_33).abs() < 1e-6);
        let colons = parse_angle("05:34:31.94", AngleUnit::Hours).unwrap();
        assert!((deg - colons).abs() < 1e-12);
    }

    #[test]
    fn test_parse_angle_sexagesimal_negative_dec() {
        let deg = parse_angle("-01 12 43.2", AngleUnit::Degrees).unwrap();
        assert!((deg - -(1.0 + 12.0 / 60.0 + 43.2 / 3600.0)).abs() < 1e-12);
        // sign applies to the whole angle, not only the degrees field
        let deg = parse_angle("-00 30 00", AngleUnit::Degrees).unwrap();
        assert!((deg - -0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_angle_garbage() {
        assert!(parse_angle("", AngleUnit::Degrees).is_err());
        assert!(parse_angle("not an angle", AngleUnit::Degrees).is_err());
        assert!(parse_angle("1 2 3 4", AngleUnit::Degrees).is_err());
    }
}
