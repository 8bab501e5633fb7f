// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use timeless_api::{
    api::router,
    config::get_settings,
    logging,
    probe::SupabaseProbe,
    server::{serve, shutdown_on_signal},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_from_env();

    // Missing or malformed settings are fatal; never serve with partial config.
    let settings = match get_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration, refusing to start");
            return Err(e.into());
        }
    };

    let mut state = AppState::new(settings.clone());
    match SupabaseProbe::from_settings(&settings) {
        Ok(probe) => state = state.with_probe(Arc::new(probe)),
        Err(e) => warn!(error = %e, "Data store probe unavailable, health will omit database status"),
    }

    let addr = settings.bind_address()?;
    let app = router(state);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    info!(
        %addr,
        environment = %settings.environment,
        api_version = %settings.api_version,
        "Timeless API starting (docs at /docs)"
    );

    serve(app, addr, shutdown).await?;

    info!("Server stopped");
    Ok(())
}
