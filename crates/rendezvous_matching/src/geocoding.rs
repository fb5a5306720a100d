//! Reverse geocoding against a Nominatim-compatible HTTP API.

use rendezvous_common::models::{Address, GeoPoint};
use rendezvous_common::{BoxFuture, GatewayError, ReverseGeocoder};
use rendezvous_config::GeocodingConfig;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

const SERVICE: &str = "geocoder";
const DEFAULT_USER_AGENT: &str = concat!("rendezvous/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<NominatimAddress>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    state: Option<String>,
    country: Option<String>,
    postcode: Option<String>,
}

impl From<NominatimAddress> for Address {
    fn from(raw: NominatimAddress) -> Self {
        let street = match (raw.house_number, raw.road) {
            (Some(number), Some(road)) => Some(format!("{} {}", number, road)),
            (_, road) => road,
        };
        Address {
            street,
            city: raw.city.or(raw.town).or(raw.village).or(raw.hamlet),
            state: raw.state,
            country: raw.country,
            postal_code: raw.postcode,
        }
    }
}

/// Reverse geocoder calling `GET {base_url}/reverse`.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: Client,
    base_url: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        }
    }

    async fn lookup(&self, point: GeoPoint) -> Result<Option<Address>, GatewayError> {
        let response = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .header(header::USER_AGENT, &self.user_agent)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", point.latitude.to_string()),
                ("lon", point.longitude.to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("reverse lookup failed with status {}: {}", status, text);
            return Err(if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                GatewayError::transient(SERVICE, message)
            } else {
                GatewayError::permanent(SERVICE, message)
            });
        }

        let body: ReverseResponse = response.json().await.map_err(request_error)?;
        if let Some(error) = body.error {
            debug!("No address for {:?}: {}", point, error);
            return Ok(None);
        }
        Ok(body.address.map(Address::from))
    }
}

fn request_error(err: reqwest::Error) -> GatewayError {
    let base = if err.is_timeout() || err.is_connect() {
        GatewayError::transient(SERVICE, err.to_string())
    } else {
        GatewayError::permanent(SERVICE, err.to_string())
    };
    base.with_source(err)
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, point: GeoPoint) -> BoxFuture<'_, Option<Address>, GatewayError> {
        Box::pin(self.lookup(point))
    }
}
