#[cfg(test)]
mod tests {
    use crate::geo::{distance_km, EARTH_RADIUS_KM};
    use proptest::prelude::*;
    use rendezvous_common::models::GeoPoint;

    fn point() -> impl Strategy<Value = GeoPoint> {
        (-90.0..=90.0f64, -180.0..=180.0f64).prop_map(|(lat, lon)| GeoPoint::new(lat, lon))
    }

    proptest! {
        #[test]
        fn distance_to_self_is_zero(p in point()) {
            prop_assert!(distance_km(p, p).abs() < 1e-9);
        }

        #[test]
        fn distance_is_symmetric(a in point(), b in point()) {
            prop_assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
        }

        #[test]
        fn distance_is_bounded_by_half_circumference(a in point(), b in point()) {
            let d = distance_km(a, b);
            prop_assert!(d.is_finite());
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
        }
    }
}
