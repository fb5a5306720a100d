use rendezvous_common::{NoopGeocoder, PushGateway, RecordingPushGateway, ReverseGeocoder};
use rendezvous_config::AppConfig;
use rendezvous_db::{DbError, DocumentStore, StoreFactory};
use rendezvous_firebase::{FirebaseClient, FirebaseError};
use rendezvous_matching::{MatchingState, NominatimGeocoder};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Reasons the server cannot start.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("document store: {0}")]
    Store(#[from] DbError),

    #[error("push gateway: {0}")]
    Firebase(#[from] FirebaseError),

    #[error("{0} is enabled but the [{1}] section is missing")]
    MissingSection(&'static str, &'static str),
}

/// Application state that is shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub matching: Arc<MatchingState>,
}

/// Builder for [`AppState`]; anything not supplied is derived from the config.
pub struct AppStateBuilder {
    config: Arc<AppConfig>,
    store: Option<Arc<dyn DocumentStore>>,
    push: Option<Arc<dyn PushGateway>>,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    shutdown: CancellationToken,
}

impl AppStateBuilder {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            store: None,
            push: None,
            geocoder: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_push_gateway(mut self, push: Arc<dyn PushGateway>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Build the AppState.
    pub async fn build(self) -> Result<AppState, StartupError> {
        let store = match self.store {
            Some(store) => store,
            None => StoreFactory::new().from_app_config(&self.config).await?,
        };
        let push = match self.push {
            Some(push) => push,
            None => push_gateway(&self.config)?,
        };
        let geocoder = match self.geocoder {
            Some(geocoder) => geocoder,
            None => geocoder(&self.config)?,
        };

        let matching = MatchingState::new(&self.config, store, push, geocoder)
            .with_shutdown(self.shutdown);

        Ok(AppState {
            config: self.config,
            matching: Arc::new(matching),
        })
    }
}

impl AppState {
    pub fn builder(config: Arc<AppConfig>) -> AppStateBuilder {
        AppStateBuilder::new(config)
    }
}

fn push_gateway(config: &AppConfig) -> Result<Arc<dyn PushGateway>, StartupError> {
    if !config.use_firebase {
        warn!("Firebase disabled, push notifications are only recorded in the log");
        return Ok(Arc::new(RecordingPushGateway::new()));
    }
    let firebase = config
        .firebase
        .as_ref()
        .ok_or(StartupError::MissingSection("use_firebase", "firebase"))?;
    info!("Sending push notifications through FCM");
    Ok(Arc::new(FirebaseClient::new(firebase)?))
}

fn geocoder(config: &AppConfig) -> Result<Arc<dyn ReverseGeocoder>, StartupError> {
    if !config.use_geocoding {
        info!("Reverse geocoding disabled");
        return Ok(Arc::new(NoopGeocoder));
    }
    let geocoding = config
        .geocoding
        .as_ref()
        .ok_or(StartupError::MissingSection("use_geocoding", "geocoding"))?;
    info!("Reverse geocoding through {}", geocoding.base_url);
    Ok(Arc::new(NominatimGeocoder::new(geocoding)))
}
