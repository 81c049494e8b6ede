use clap::{Args, Parser, Subcommand};
use cogitosphere::accounts::{self, NewAccount};
use cogitosphere::store::{Database, StoreError};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use time::Duration;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(cogitosphere::config::AppConfig),
    Exit(i32),
}

pub(crate) async fn run() -> RunOutcome {
    let cli = Cli::parse();
    match &cli.command {
        Some(Command::AuthKey) => return RunOutcome::Exit(run_auth_key()),
        Some(Command::CreateAdmin(args)) => {
            let code = run_create_admin(cli.data_dir.as_deref(), args).await;
            return RunOutcome::Exit(code);
        }
        None => {}
    }

    let data_dir = match cli.data_dir.as_deref().map(prepare_data_dir) {
        Some(Ok(dir)) => dir,
        Some(Err(err)) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
        None => {
            eprintln!("error: --data-dir is required unless using a subcommand");
            return RunOutcome::Exit(2);
        }
    };

    let auth = match resolve_auth_config(&cli) {
        Ok(auth) => auth,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    RunOutcome::Serve(cogitosphere::config::AppConfig {
        data_dir: Some(data_dir),
        bind: cli.bind,
        app_name: cli.app_name,
        cors_origins: cli
            .cors_origins
            .into_iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect(),
        auth,
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "cogitosphere",
    version,
    about = "API server for the CogitoSphere learning community"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "COGITO_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, env = "COGITO_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,
    #[arg(long, env = "COGITO_APP_NAME", default_value = "CogitoSphere")]
    app_name: String,
    #[arg(long, env = "COGITO_AUTH_KEY")]
    auth_key: Option<String>,
    #[arg(long, env = "COGITO_AUTH_TOKEN_TTL")]
    auth_token_ttl: Option<String>,
    #[arg(
        long = "cors-origin",
        env = "COGITO_CORS_ORIGINS",
        value_delimiter = ','
    )]
    cors_origins: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh base64 signing key for --auth-key.
    AuthKey,
    /// Create an admin account, or promote an existing one by e-mail.
    ///
    /// The server locks the data directory while it runs, so stop it first.
    CreateAdmin(CreateAdminArgs),
}

#[derive(Args, Debug)]
struct CreateAdminArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "COGITO_ADMIN_PASSWORD")]
    password: String,
}

fn run_auth_key() -> i32 {
    let secret = match cogitosphere::auth::generate_auth_key() {
        Ok(secret) => secret,
        Err(err) => {
            eprintln!("failed to generate auth key: {err}");
            return 1;
        }
    };
    println!("{secret}");
    0
}

async fn run_create_admin(data_dir: Option<&Path>, args: &CreateAdminArgs) -> i32 {
    let Some(data_dir) = data_dir else {
        eprintln!("error: --data-dir is required for create-admin");
        return 2;
    };
    let data_dir = match prepare_data_dir(data_dir) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };
    let db = match Database::open(&data_dir).await {
        Ok(db) => db,
        Err(err @ StoreError::Locked(_)) => {
            eprintln!("error: {err}; stop the server before running create-admin");
            return 1;
        }
        Err(err) => {
            eprintln!("failed to open data directory: {err}");
            return 1;
        }
    };
    let account = NewAccount {
        name: args.name.clone(),
        username: args.username.clone(),
        email: args.email.clone(),
        password: args.password.clone(),
    };
    let code = match accounts::ensure_admin(&db, account).await {
        Ok(user) => {
            println!("admin {} <{}> is ready ({})", user.username, user.email, user.id);
            0
        }
        Err(err) => {
            eprintln!("failed to create admin: {err}");
            1
        }
    };
    if let Err(err) = db.close().await {
        eprintln!("failed to close data directory: {err}");
        return 1;
    }
    code
}

fn prepare_data_dir(dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(dir)
        .map_err(|err| format!("failed to create data directory {}: {err}", dir.display()))?;
    let dir = std::fs::canonicalize(dir)
        .map_err(|err| format!("failed to resolve data directory: {err}"))?;
    if !dir.is_dir() {
        return Err(format!("data path is not a directory: {}", dir.display()));
    }
    Ok(dir)
}

fn resolve_auth_config(cli: &Cli) -> Result<cogitosphere::config::AuthConfig, String> {
    let auth_key = cli
        .auth_key
        .as_ref()
        .ok_or("--auth-key is required; generate one with the auth-key subcommand")?
        .trim();
    if auth_key.is_empty() {
        return Err("auth key cannot be empty".to_string());
    }

    let token_ttl = match cli.auth_token_ttl.as_deref() {
        Some(raw) => parse_auth_token_ttl(raw)?,
        None => default_auth_token_ttl(),
    };

    Ok(cogitosphere::config::AuthConfig {
        key: auth_key.to_string(),
        token_ttl,
    })
}

fn default_auth_token_ttl() -> Duration {
    Duration::days(7)
}

fn parse_auth_token_ttl(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("auth token ttl cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err("auth token ttl must be greater than 0".to_string());
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(format!(
            "invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"
        )),
    }
}
