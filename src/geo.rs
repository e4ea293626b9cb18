use std::cmp::Ordering;

use crate::server::Server;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// The `n` servers nearest to the client, each returned with its computed
/// `distance_km` attached. The input is left untouched; ties keep the
/// directory's order.
pub fn closest(n: usize, servers: &[Server], client_lat: f64, client_lon: f64) -> Vec<Server> {
    if n == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<Server> = servers
        .iter()
        .map(|s| {
            let mut s = s.clone();
            s.distance_km = Some(haversine_km(client_lat, client_lon, s.lat, s.lon));
            s
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(n);
    ranked
}
