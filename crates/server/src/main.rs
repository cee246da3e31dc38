use std::{net::SocketAddr, sync::Arc};

use admission::{lock_join_to_members, AdmissionEngine, ExclusionQueue};
use call_backend::{InMemoryCallBackend, JwtCredentialIssuer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, DEV_CREDENTIAL_SECRET};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings();
    if settings.credential_api_secret == DEV_CREDENTIAL_SECRET {
        warn!("signing credentials with the development secret; set STREAM_API_SECRET");
    }

    let backend = Arc::new(
        InMemoryCallBackend::new()
            .with_open_call_type(&settings.call_type)
            .await,
    );
    if settings.lock_join_grants {
        lock_join_to_members(backend.as_ref(), &settings.call_type)
            .await
            .map_err(|error| {
                error!(call_type = %settings.call_type, %error, "failed to lock join grants");
                error
            })?;
    }

    let engine = AdmissionEngine::new(
        backend.clone(),
        backend,
        Arc::new(JwtCredentialIssuer::new(
            settings.credential_api_key.clone(),
            settings.credential_api_secret.clone(),
        )),
        ExclusionQueue::new(),
        settings.admission(),
    );
    let app = api::build_router(Arc::new(AppState {
        engine: Arc::new(engine),
    }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(
        %addr,
        group_capacity = settings.group_capacity,
        page_size = settings.members_page_size,
        "server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
