use std::{env, net::SocketAddr, process, sync::Arc};

use bartender_auth::{
    build_api_route_filter, handle_auth_errors, track_requests, Auth, AuthConfig, AuthError,
    InMemoryDirectory, ShutdownSignal,
};
use tracing_subscriber::EnvFilter;
use warp::Filter;

const DEFAULT_PORT: u16 = 8081;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "auth service failed to start");
        process::exit(1);
    }
}

async fn run() -> Result<(), AuthError> {
    let config = AuthConfig::from_env()?;
    let port = match env::var("PORT") {
        Ok(port) => port
            .parse::<u16>()
            .map_err(|_| AuthError::Configuration(format!("PORT is not a valid port: {port}")))?,
        Err(_) => DEFAULT_PORT,
    };

    let auth = Auth::new(config, Arc::new(InMemoryDirectory::new()))?;

    if let (Ok(username), Ok(password)) = (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
        let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| format!("{username}@localhost"));
        auth.ensure_admin(&username, &email, &password).await?;
    }

    let routes = build_api_route_filter(&auth)
        .recover(handle_auth_errors)
        .with(track_requests(&auth))
        .with(warp::trace::request());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, ShutdownSignal::install().wait())
        .map_err(|err| AuthError::Configuration(format!("cannot bind {addr}: {err}")))?;

    tracing::info!(%bound, "auth service listening");
    server.await;
    tracing::info!("auth service shut down");

    Ok(())
}
