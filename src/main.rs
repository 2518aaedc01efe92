use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::CorsLayer;

use kuro_auth::errors::TokenError;
use kuro_auth::models::profile::{map_github_profile, GithubProfile};
use kuro_auth::models::user::Principal;
use kuro_auth::store::memory::MemoryStore;
use kuro_auth::store::postgres::PgStore;
use kuro_auth::store::{SessionStore, TokenStore, UserStore};
use kuro_auth::tokens::TokenService;
use kuro_auth::{api, cli, config, jobs, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    telemetry::init(cfg.log_json)?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port, in_memory }) => {
            let port = port.unwrap_or(cfg.port);
            if in_memory {
                tracing::warn!("running with in-memory store; all tokens are lost on exit");
                run_server(cfg, MemoryStore::new(), port).await
            } else {
                let db = connect_and_migrate(&cfg.database_url).await?;
                run_server(cfg, db, port).await
            }
        }
        Some(cli::Commands::Token { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let tokens = TokenService::new(Arc::new(db)).with_max_attempts(cfg.mint_max_attempts);
            handle_token_command(command, &tokens).await
        }
        Some(cli::Commands::User { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_user_command(command, &db).await
        }
        None => {
            let port = cfg.port;
            let db = connect_and_migrate(&cfg.database_url).await?;
            run_server(cfg, db, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    telemetry::shutdown();
    result
}

async fn connect_and_migrate(database_url: &str) -> anyhow::Result<PgStore> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(database_url)
        .await
        .context("failed to connect to database")?;
    db.ping().await.context("database ping failed")?;

    tracing::info!("Running migrations...");
    db.migrate().await?;
    Ok(db)
}

async fn run_server<S>(cfg: config::Config, store: S, port: u16) -> anyhow::Result<()>
where
    S: TokenStore + SessionStore + UserStore + Clone + 'static,
{
    let shutdown_timeout = cfg.shutdown_timeout();
    let cleanup_every = cfg.cleanup_interval();
    let dashboard_origin = cfg.dashboard_origin.clone();
    if cfg.github.is_none() {
        tracing::warn!("GitHub provider credentials not configured; sign-in must be handled elsewhere");
    }

    let state = Arc::new(AppState::new(cfg, store));

    let app = api::router(state.clone()).layer(DefaultBodyLimit::max(64 * 1024));
    let app = api::with_request_tracing(app)
        .layer({
            use axum::http::{header, Method};
            use tower_http::cors::AllowOrigin;
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                // NOTE: AllowHeaders::any() is rejected together with allow_credentials(true)
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ORIGIN])
                .allow_credentials(true)
        })
        .layer(axum::middleware::from_fn(security_headers_middleware));

    if let Some(every) = cleanup_every {
        jobs::cleanup::spawn(state.tokens.clone(), every);
        tracing::info!("Background cleanup job started (expired tokens every {:?})", every);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("kuro-auth listening on {}", addr);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .into_future(),
    );

    tokio::select! {
        _ = shutdown_signal() => {}
        res = &mut server => {
            res??;
            return Ok(());
        }
    }

    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(joined) => {
            joined??;
            tracing::info!("shutdown complete");
        }
        Err(_) => {
            tracing::error!(
                "graceful shutdown did not finish within {:?}; dropping open connections",
                shutdown_timeout
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));

    // Minted tokens travel in response bodies; never let them be cached
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));

    headers.remove("Server");

    resp
}

async fn handle_token_command(
    cmd: cli::TokenCommands,
    tokens: &TokenService,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Mint { user, expires_at } => {
            // operator-issued: the CLI stands in for the user's session
            let principal = Principal::from_session(user);
            let issued = tokens.mint(Some(&principal), expires_at.as_str()).await?;
            println!(
                "Token created:\n  ID:      {}\n  Expires: {}\n  Token:   {}\n\nThis is the only time the token is shown.",
                issued.id, issued.expires_at, issued.raw
            );
        }
        cli::TokenCommands::Verify { token } => match tokens.verify(&token).await {
            Ok(user_id) => println!("Valid token for user {}", user_id),
            Err(e) => anyhow::bail!("token rejected: {}", e),
        },
        cli::TokenCommands::List { user } => {
            let principal = Principal::from_session(user);
            let rows = tokens.list(&principal).await?;
            if rows.is_empty() {
                println!("No tokens found.");
            } else {
                println!("{:<66} {:<26} CREATED", "ID", "EXPIRES");
                for t in rows {
                    println!(
                        "{:<66} {:<26} {}",
                        t.id,
                        t.expires_at.to_rfc3339(),
                        t.created_at.format("%Y-%m-%d")
                    );
                }
            }
        }
        cli::TokenCommands::Revoke { user, id } => {
            let principal = Principal::from_session(user);
            match tokens.revoke(&principal, &id).await {
                Ok(()) => println!("Token revoked."),
                Err(TokenError::InvalidToken) => println!("Token not found."),
                Err(e) => return Err(e.into()),
            }
        }
        cli::TokenCommands::Purge => {
            let removed = jobs::cleanup::purge_expired_tokens(tokens).await?;
            println!("Purged {} expired token(s).", removed);
        }
    }
    Ok(())
}

async fn handle_user_command(cmd: cli::UserCommands, db: &PgStore) -> anyhow::Result<()> {
    match cmd {
        cli::UserCommands::Import { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let profile: GithubProfile =
                serde_json::from_str(&raw).context("not a GitHub profile document")?;
            let fields = map_github_profile(&profile);
            let id = db.upsert_user(&fields).await?;
            println!(
                "User imported:\n  ID:       {}\n  Username: {}\n  Name:     {}",
                id, fields.username, fields.name
            );
        }
    }
    Ok(())
}
