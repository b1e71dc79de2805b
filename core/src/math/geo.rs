use crate::prelude::Coordinate;

/// Mean Earth radius in kilometres used by the spherical approximation.
pub const EARTH_RADIUS_KM: f64 = 6373.0;

pub struct GeoHelper;

impl GeoHelper {
    /// Great-circle distance in kilometres between two coordinates in radians.
    pub fn haversine(from: &Coordinate, to: &Coordinate) -> f64 {
        let dlat = to.latitude - from.latitude;
        let dlon = to.longitude - from.longitude;
        let a = (dlat / 2.0).sin().powi(2)
            + from.latitude.cos() * to.latitude.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}
