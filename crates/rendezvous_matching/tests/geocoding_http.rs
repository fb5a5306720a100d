use rendezvous_common::models::GeoPoint;
use rendezvous_common::ReverseGeocoder;
use rendezvous_config::GeocodingConfig;
use rendezvous_matching::geocoding::NominatimGeocoder;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn geocoder(server: &MockServer) -> NominatimGeocoder {
    NominatimGeocoder::new(&GeocodingConfig {
        base_url: server.uri(),
        user_agent: Some("rendezvous-tests".to_string()),
    })
}

#[tokio::test]
async fn resolves_an_address() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("format", "jsonv2"))
        .and(query_param("lat", "48.8566"))
        .and(query_param("lon", "2.3522"))
        .and(header("user-agent", "rendezvous-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "display_name": "Hôtel de Ville, Paris",
            "address": {
                "house_number": "5",
                "road": "Rue de Lobau",
                "city": "Paris",
                "state": "Île-de-France",
                "country": "France",
                "postcode": "75004"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let address = geocoder(&server)
        .reverse(GeoPoint::new(48.8566, 2.3522))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(address.street.as_deref(), Some("5 Rue de Lobau"));
    assert_eq!(address.city.as_deref(), Some("Paris"));
    assert_eq!(address.postal_code.as_deref(), Some("75004"));
}

#[tokio::test]
async fn unresolvable_points_yield_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "Unable to geocode"})))
        .mount(&server)
        .await;

    let address = geocoder(&server)
        .reverse(GeoPoint::new(0.0, -140.0))
        .await
        .unwrap();

    assert!(address.is_none());
}

#[tokio::test]
async fn throttling_is_transient_and_bad_requests_are_not() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("lat", "1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("lat", "2"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad lat"))
        .mount(&server)
        .await;

    let geocoder = geocoder(&server);
    let throttled = geocoder.reverse(GeoPoint::new(1.0, 0.0)).await.unwrap_err();
    assert!(throttled.transient);

    let rejected = geocoder.reverse(GeoPoint::new(2.0, 0.0)).await.unwrap_err();
    assert!(!rejected.transient);
    assert!(rejected.message.contains("bad lat"));
}
