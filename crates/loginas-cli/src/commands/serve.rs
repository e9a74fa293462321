use std::sync::Arc;

use loginas_api::{SessionBackend, UserStore};
use loginas_auth::{Clock, TokenGenerator};
use loginas_connectors::{MemorySessionBackend, MemoryUserStore};
use loginas_core::Settings;
use loginas_gateway::{GatewayState, router, serve};

pub fn cmd_serve(
    settings: &Settings,
    tokens: TokenGenerator,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<()> {
    let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::with_users(settings.users.clone()));
    let sessions: Arc<dyn SessionBackend> =
        Arc::new(MemorySessionBackend::new(users.clone(), clock.clone()));

    let state = GatewayState::from_settings(settings, tokens, users, sessions, clock);
    let app = router(state, &settings.urls.route_prefix);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(&settings.bind, app))?;
    Ok(())
}
