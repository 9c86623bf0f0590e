//! Geographic primitives used by the routing graph.
//!
//! Coordinates are WGS84 longitude/latitude in decimal degrees. Distances are
//! great-circle distances in kilometres on a spherical Earth, which is the
//! convention used for edge weights and for the A* heuristic.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Length of one degree of latitude in kilometres.
const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// A geographic position with an optional altitude in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            alt: None,
        }
    }

    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = Some(alt);
        self
    }

    /// Great-circle distance to another point in kilometres (haversine).
    pub fn distance_km(&self, other: &Self) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let dphi = (other.lat - self.lat).to_radians();
        let dlambda = (other.lon - self.lon).to_radians();

        let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Initial bearing towards `other`, in degrees clockwise from north (0..360).
    pub fn bearing_deg(&self, other: &Self) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let dlambda = (other.lon - self.lon).to_radians();

        let y = dlambda.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }

    /// Point reached after travelling `distance_km` along `bearing_deg`.
    pub fn destination(&self, distance_km: f64, bearing_deg: f64) -> Self {
        let delta = distance_km / EARTH_RADIUS_KM;
        let theta = bearing_deg.to_radians();
        let phi1 = self.lat.to_radians();
        let lambda1 = self.lon.to_radians();

        let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
        let lambda2 = lambda1
            + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

        Self {
            lon: (lambda2.to_degrees() + 540.0) % 360.0 - 180.0,
            lat: phi2.to_degrees(),
            alt: self.alt,
        }
    }

    /// Closest point to `self` on the segment `a`-`b`, with its distance in km.
    ///
    /// The projection is done in a local equirectangular frame centred on the
    /// segment, which is accurate for the short segments of airport and
    /// airway networks. The returned distance is the great-circle distance to
    /// the projected point.
    pub fn nearest_on_segment(&self, a: &Point, b: &Point) -> (Point, f64) {
        let lat0 = ((a.lat + b.lat) / 2.0).to_radians();
        let kx = KM_PER_DEGREE * lat0.cos();
        let ky = KM_PER_DEGREE;

        let (bx, by) = ((b.lon - a.lon) * kx, (b.lat - a.lat) * ky);
        let (px, py) = ((self.lon - a.lon) * kx, (self.lat - a.lat) * ky);
        let len2 = bx * bx + by * by;

        let t = if len2 == 0.0 {
            0.0
        } else {
            ((px * bx + py * by) / len2).clamp(0.0, 1.0)
        };

        let projected = Point {
            lon: a.lon + t * (b.lon - a.lon),
            lat: a.lat + t * (b.lat - a.lat),
            alt: None,
        };
        let distance = self.distance_km(&projected);
        (projected, distance)
    }
}

/// Axis-aligned longitude/latitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon: min_lon.min(max_lon),
            min_lat: min_lat.min(max_lat),
            max_lon: min_lon.max(max_lon),
            max_lat: min_lat.max(max_lat),
        }
    }

    /// Rectangle spanning the two endpoints, extended by `margin_km` on every side.
    pub fn around(a: &Point, b: &Point, margin_km: f64) -> Self {
        let margin_km = margin_km.max(0.0);
        let dlat = margin_km / KM_PER_DEGREE;
        let widest = a.lat.abs().max(b.lat.abs()).min(89.0).to_radians();
        let dlon = margin_km / (KM_PER_DEGREE * widest.cos().max(0.01));

        Self::new(
            a.lon.min(b.lon) - dlon,
            a.lat.min(b.lat) - dlat,
            a.lon.max(b.lon) + dlon,
            a.lat.max(b.lat) + dlat,
        )
    }

    /// Whether the point lies inside the rectangle (edges inclusive).
    pub fn contains(&self, point: &Point) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }

    /// Intersection of two rectangles, or `None` when they are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min_lon = self.min_lon.max(other.min_lon);
        let min_lat = self.min_lat.max(other.min_lat);
        let max_lon = self.max_lon.min(other.max_lon);
        let max_lat = self.max_lat.min(other.max_lat);
        if min_lon > max_lon || min_lat > max_lat {
            return None;
        }
        Some(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}
