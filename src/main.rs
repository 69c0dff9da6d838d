//! SignatureRx gateway server.

// std
use std::sync::Arc;
// crates.io
use color_eyre::eyre::{Result, WrapErr};
use tokio::{net::TcpListener, signal};
// self
use signaturerx_broker::{
	api::{self, AppState},
	config::{Config, StoreBackend},
	error::ConfigError,
	flows::TokenManager,
	http,
	oauth::{MockTokenEndpoint, ReqwestTokenEndpoint, TokenEndpoint},
	obs,
	prescribing::{MockPrescribingApi, PrescribingApi, PrescriptionIssuer, ReqwestPrescribingApi},
	records::{MemoryRepository, PrescriptionRepository},
	refresher::BackgroundRefresher,
	store::{FileStore, MemoryStore, TokenStore},
	webhook::WebhookHandler,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::install_subscriber();

	let config = Config::load().wrap_err("Failed to load configuration.")?;
	let store = open_store(&config).await?;
	let (endpoint, prescribing) = upstreams(&config)?;
	let manager = TokenManager::new(store, endpoint)
		.with_credentials(
			config.credentials.client_id.clone(),
			config.credentials.client_secret.expose(),
		)
		.with_refresh_grant(config.supports_refresh_grant);
	let repository: Arc<dyn PrescriptionRepository> = Arc::new(MemoryRepository::default());
	let issuer = PrescriptionIssuer::new(manager.clone(), prescribing)
		.with_status_policy(config.status_policy.clone());
	let webhooks = WebhookHandler::new(
		repository.clone(),
		config.webhook_signing_secret.expose(),
		config.webhook_format,
	);
	let state = Arc::new(AppState { issuer, repository, webhooks });
	let refresher = BackgroundRefresher::new(manager, config.token_check_interval);
	let listener = TcpListener::bind(config.listen_addr())
		.await
		.wrap_err_with(|| format!("Failed to bind {}.", config.listen_addr()))?;

	if config.webhook_signing_secret.expose().is_empty() {
		tracing::warn!("SIGNATURERX_WEBHOOK_SIGNING_SECRET is empty; every webhook will be rejected.");
	}

	tracing::info!(
		addr = %config.listen_addr(),
		mock = config.mock,
		store = config.token_store.label(),
		"SignatureRx gateway listening."
	);

	refresher.start();

	let served = axum::serve(listener, api::router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await;

	refresher.stop().await;

	tracing::info!("SignatureRx gateway stopped.");

	served.wrap_err("Server terminated unexpectedly.")
}

async fn open_store(config: &Config) -> Result<Arc<dyn TokenStore>> {
	let store: Arc<dyn TokenStore> = match &config.token_store {
		StoreBackend::Memory => Arc::new(MemoryStore::default()),
		StoreBackend::File(path) => Arc::new(
			FileStore::open(path.clone())
				.wrap_err_with(|| format!("Failed to open token store at {}.", path.display()))?,
		),
		#[cfg(feature = "redis")]
		StoreBackend::Redis => Arc::new(
			signaturerx_broker::store::RedisStore::connect(&config.redis_url)
				.await
				.wrap_err("Failed to connect to Redis.")?,
		),
		#[cfg(not(feature = "redis"))]
		StoreBackend::Redis =>
			return Err(ConfigError::UnsupportedStore { backend: "redis".into() }.into()),
	};

	Ok(store)
}

fn upstreams(config: &Config) -> Result<(Arc<dyn TokenEndpoint>, Arc<dyn PrescribingApi>)> {
	if config.mock {
		tracing::warn!("Mock mode is enabled; SignatureRx will not be contacted.");

		let endpoint: Arc<dyn TokenEndpoint> =
			Arc::new(MockTokenEndpoint::new(config.mock_jwt_secret.expose()));
		let prescribing: Arc<dyn PrescribingApi> = Arc::new(MockPrescribingApi);

		return Ok((endpoint, prescribing));
	}
	if !config.credentials.is_complete() {
		tracing::warn!(error = %ConfigError::MissingCredentials, "Token requests will likely be rejected.");
	}

	let client = http::build_client(config.http_timeout)?;
	let endpoint: Arc<dyn TokenEndpoint> = Arc::new(
		ReqwestTokenEndpoint::new(client.clone(), config.token_url.clone())
			.with_format(config.token_request_format),
	);
	let prescribing: Arc<dyn PrescribingApi> =
		Arc::new(ReqwestPrescribingApi::new(client, config.prescription_url.clone()));

	Ok((endpoint, prescribing))
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to listen for SIGTERM.");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("Shutdown signal received.");
}
