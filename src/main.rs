use flashline::client::*;
use flashline::domain_model::CallRequest;
use flashline::logger::*;
use flashline::settings::*;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let session = Arc::new(Session::try_new(&project_settings)?);

    // Exercise the dispatch path once, then watch the refresh machinery
    // until interrupted.
    match session.call(CallRequest::get("/users/me")).await {
        Ok(response) => info!(message = %response.message, "profile call succeeded"),
        Err(e) => warn!("profile call failed: {e}"),
    }

    let mut events = session.events();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => info!(?event, "session event"),
                Err(_) => break,
            },
        }
    }

    session.sign_out().await;
    session.shutdown().await;
    info!("session shut down");

    Ok(())
}
