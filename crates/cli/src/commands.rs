//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use fincrm_core::{ClientConfig, Service, StateDir};
use fincrm_http::client::{ClientError, FilePersistence, NavigationPort, RouteNavigator};
use fincrm_http::{ApiRequest, Method, ServiceClients};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and persist the session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "FINCRM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and persist the session
    Register {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "FINCRM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the persisted session
    Logout,

    /// Show whether a session is stored and when it expires
    Status,

    /// Send an authenticated request to one of the services
    Request {
        /// Target service (auth, wallet, transaction, ledger, analytics)
        service: Service,

        /// HTTP method
        method: String,

        /// Request path, e.g. /api/v1/wallets
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,

        /// Query parameter as key=value, repeatable
        #[arg(long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// Client configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration file
    Init {
        /// Output file path (defaults to <state dir>/config/client.toml)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

/// Everything a command needs to talk to the services
struct Session {
    clients: ServiceClients,
    navigator: Arc<RouteNavigator>,
}

impl Session {
    fn open(config: &ClientConfig, state_dir: &StateDir, initial_route: &str) -> Result<Self> {
        let cookie_path = state_dir.refresh_cookie_path();
        debug!(path = %cookie_path.display(), "Using persisted session");

        let navigator = Arc::new(RouteNavigator::new(
            config.session.login_route.as_str(),
            initial_route,
        ));
        let clients = ServiceClients::new(
            config,
            Arc::new(FilePersistence::new(cookie_path)),
            navigator.clone(),
        )
        .context("Failed to create service clients")?;

        Ok(Self { clients, navigator })
    }
}

impl Commands {
    pub async fn execute(self, config: Option<PathBuf>, state_dir: Option<PathBuf>) -> Result<()> {
        let state_dir = state_dir.map_or_else(StateDir::new, StateDir::with_override);
        let config_path = config.or_else(|| {
            let default = state_dir.config_path();
            default.exists().then_some(default)
        });
        let config = ClientConfig::load(config_path.as_deref())
            .context("Failed to load client configuration")?;

        match self {
            Self::Login { email, password } => {
                let login_route = config.session.login_route.clone();
                let session = Session::open(&config, &state_dir, &login_route)?;
                session
                    .clients
                    .auth_api()
                    .login(email, password)
                    .await
                    .map_err(explain)?;
                println!("Logged in");
                Ok(())
            }
            Self::Register {
                name,
                email,
                password,
            } => {
                let login_route = config.session.login_route.clone();
                let session = Session::open(&config, &state_dir, &login_route)?;
                session
                    .clients
                    .auth_api()
                    .register(name, email, password)
                    .await
                    .map_err(explain)?;
                println!("Account created, logged in");
                Ok(())
            }
            Self::Logout => {
                let session = Session::open(&config, &state_dir, "/")?;
                session.clients.auth_api().logout();
                println!("Logged out");
                Ok(())
            }
            Self::Status => {
                let session = Session::open(&config, &state_dir, "/")?;
                match session.clients.tokens().refresh_cookie() {
                    Some(cookie) => println!("Logged in, session expires at {}", cookie.expires_at()),
                    None => println!("Not logged in"),
                }
                Ok(())
            }
            Self::Request {
                service,
                method,
                path,
                body,
                query,
            } => {
                let session = Session::open(&config, &state_dir, "/")?;
                let request = build_request(&method, path, body.as_deref(), query)?;

                let result = session
                    .clients
                    .get(service)
                    .request::<serde_json::Value>(request)
                    .await;

                if session.navigator.current_path_is_login() {
                    info!("Session ended, redirected to {}", session.navigator.current_route());
                }

                let value = result.map_err(explain)?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Self::Config { command } => command.execute(&config, &state_dir),
        }
    }
}

impl ConfigCommands {
    fn execute(self, config: &ClientConfig, state_dir: &StateDir) -> Result<()> {
        match self {
            Self::Init { output, force } => {
                let config_path = output.unwrap_or_else(|| state_dir.config_path());
                if config_path.exists() && !force {
                    bail!(
                        "{} already exists, pass --force to overwrite",
                        config_path.display()
                    );
                }
                write_default_config(&config_path)?;
                println!("Generated client configuration at: {}", config_path.display());
                Ok(())
            }
            Self::Show => {
                println!("{}", toml::to_string_pretty(config)?);
                Ok(())
            }
        }
    }
}

fn write_default_config(path: &Path) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(&ClientConfig::default())?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn build_request(
    method: &str,
    path: String,
    body: Option<&str>,
    query: Vec<(String, String)>,
) -> Result<ApiRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{method}'"))?;

    let mut request = ApiRequest::new(method, path);
    if let Some(body) = body {
        let body: serde_json::Value =
            serde_json::from_str(body).context("--body must be valid JSON")?;
        request = request.json_value(body);
    }
    for (key, value) in query {
        request = request.query_pair(key, value);
    }
    Ok(request)
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

/// Attach a hint for errors that need the user to log in again
fn explain(error: ClientError) -> anyhow::Error {
    if error.requires_login() {
        anyhow::Error::new(error).context("Not logged in, run `fincrm login`")
    } else {
        error.into()
    }
}
