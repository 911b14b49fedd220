use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use medgate::{
    AppState, auth::JwtVerifier, authz::AccessPolicy, build_app, config::GatewayConfig,
    observability,
};

/// CLI arguments for the medgate authorization gateway
#[derive(Parser, Debug)]
#[command(version, about = "Request authorization gateway", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "medgate.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the gateway server (default)
    Serve,
    /// Validate the configuration and print a summary
    Check,
    /// Show how a path is classified and which permissions it requires
    Explain {
        /// Request path, e.g. /api/workers/42/documents
        path: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        None | Some(Command::Serve) => run_server(&args.config).await,
        Some(Command::Check) => run_check(&args.config),
        Some(Command::Explain { path, json }) => run_explain(&args.config, &path, json),
    }
}

fn load_config(path: &PathBuf) -> GatewayConfig {
    match GatewayConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

async fn run_server(config_path: &PathBuf) {
    let config = load_config(config_path);

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    let bind_addr = SocketAddr::new(config.server.host, config.server.port);
    if config.upstream.is_none() {
        tracing::warn!("No [upstream] configured; allowed requests will receive 404");
    }

    let state = match AppState::with_jwt(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let app = build_app(&config, state);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind to {bind_addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        address = %bind_addr,
        upstream = config.upstream.as_ref().map(|u| u.url.as_str()).unwrap_or("none"),
        "Gateway listening"
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

fn run_check(config_path: &PathBuf) {
    let config = load_config(config_path);

    if let Err(e) = JwtVerifier::from_config(&config.auth.jwt) {
        eprintln!("Invalid [auth.jwt] settings: {e}");
        std::process::exit(1);
    }

    let access = &config.access;
    println!("Configuration OK: {}", config_path.display());
    println!("  listen:            {}:{}", config.server.host, config.server.port);
    println!(
        "  upstream:          {}",
        config.upstream.as_ref().map_or("none", |u| u.url.as_str())
    );
    println!("  api prefix:        {}", access.api_prefix);
    println!("  login path:        {}", access.login_path);
    println!("  public routes:     {}", access.public_routes.len());
    println!("  auth-only routes:  {}", access.auth_only_routes.len());
    println!("  permission rules:  {}", access.permissions.len());
    for (role, path) in &access.dashboards {
        println!("  dashboard:         {role} -> {path}");
    }
    println!("  default dashboard: {}", access.default_dashboard);
}

fn run_explain(config_path: &PathBuf, path: &str, json: bool) {
    let config = load_config(config_path);
    let policy = AccessPolicy::from_config(&config.access, &config.auth);
    let intercepted = config.access.matcher.intercepts(path);
    let report = policy.explain(path);

    if json {
        let value = serde_json::json!({
            "intercepted": intercepted,
            "report": report,
        });
        match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    } else {
        println!("intercepted: {intercepted}");
        println!("{report}");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
