//! Serve command.

use std::time::Duration;

use crate::config::Settings;
use crate::server::{serve, AppState};

use super::super::helpers::open_service;

/// Start the relay and job API server.
pub async fn cmd_serve(settings: &Settings, bind: Option<String>) -> anyhow::Result<()> {
    let mut settings = settings.clone();
    if let Some(bind) = bind {
        settings.bind = bind;
    }

    // The server must not relay through itself.
    settings.relay_url = None;

    let service = open_service(&settings).await?;
    let state = AppState::new(service, Duration::from_secs(settings.request_timeout))?;
    serve(&settings, state).await
}
