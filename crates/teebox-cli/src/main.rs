//! teebox - command line front end for the teebox account screens.
//!
//! Each subcommand is one view: log in, create an account, show the
//! account, log out. The session token is kept between runs by the store
//! selected in the config file.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use teebox_core::utils::format_date;
use teebox_core::{ApiClient, Config, Route, SessionError, SessionManager, TokenStore};

#[derive(Parser, Debug)]
#[command(name = "teebox", about = "Log in to teebox and manage your account")]
struct Cli {
    /// API server address, overrides the config file
    #[arg(long, env = "TEEBOX_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and keep the session token
    Login {
        #[arg(long, env = "TEEBOX_USERNAME")]
        username: Option<String>,
    },
    /// Create an account (does not log in)
    CreateAccount {
        #[arg(long, env = "TEEBOX_USERNAME")]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Show the logged in account
    Account,
    /// Forget the session token
    Logout,
    /// Show whether a session token is held
    Status,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load()?;
    let base_url = api_base_url(&config, cli.api_url);

    let api = ApiClient::with_timeout(&base_url, config.request_timeout())?;
    let mut session = SessionManager::new(api, config.token_store()?);
    info!(api = %base_url, authenticated = session.is_authenticated(), "teebox starting");

    let code = match cli.command {
        Command::Login { username } => login_view(&mut session, &mut config, username).await?,
        Command::CreateAccount { username, email } => {
            create_account_view(&session, username, email).await?
        }
        Command::Account => account_view(&mut session).await,
        Command::Logout => {
            session.logout();
            println!("Logged out.");
            redirect(Route::after_logout());
            ExitCode::SUCCESS
        }
        Command::Status => {
            if session.is_authenticated() {
                println!("Authenticated");
            } else {
                println!("Unauthenticated");
            }
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}

/// The server for this run. An override never ends up in the saved config.
fn api_base_url(config: &Config, override_url: Option<String>) -> String {
    override_url.unwrap_or_else(|| config.api_base_url.clone())
}

async fn login_view<S: TokenStore>(
    session: &mut SessionManager<S>,
    config: &mut Config,
    username: Option<String>,
) -> Result<ExitCode> {
    let username = match username {
        Some(u) => u,
        None => prompt_username(config.last_username.as_deref())?,
    };
    let password = prompt_password()?;

    match session.login(&username, &password).await {
        Ok(()) => {
            println!("Logged in as {}", username);
            config.last_username = Some(username);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            redirect(Route::after_login());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&e)),
    }
}

async fn create_account_view<S: TokenStore>(
    session: &SessionManager<S>,
    username: Option<String>,
    email: Option<String>,
) -> Result<ExitCode> {
    let username = match username {
        Some(u) => u,
        None => prompt_username(None)?,
    };
    let password = prompt_password()?;

    match session
        .create_account(&username, &password, email.as_deref())
        .await
    {
        Ok(profile) => {
            println!("Account created:");
            println!("  Username: {}", profile.username);
            println!("  Email:    {}", profile.email_display());
            println!("Log in with `teebox login --username {}`.", profile.username);
            redirect(Route::after_account_created());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&e)),
    }
}

async fn account_view<S: TokenStore>(session: &mut SessionManager<S>) -> ExitCode {
    if Route::Account.guard(session.state()) == Route::Login {
        return report(&SessionError::Unauthenticated);
    }

    match session.fetch_profile().await {
        Ok(profile) => {
            println!("Account");
            println!("  Username:     {}", profile.username);
            println!("  Email:        {}", profile.email_display());
            println!("  Member Since: {}", format_date(&profile.created_at));
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

/// Print a failure as plain text, plus the login redirect when it applies
fn report(err: &SessionError) -> ExitCode {
    eprintln!("Error: {}", err);
    if err.requires_login() {
        redirect(Route::Login);
    }
    ExitCode::FAILURE
}

fn redirect(route: Route) {
    match route {
        Route::Login => eprintln!("Run `teebox login` to continue."),
        Route::Feed | Route::Account | Route::CreateAccount => {
            info!(path = route.path(), "Next view");
        }
    }
}

fn prompt_username(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match default {
        Some(last) if input.is_empty() => last.to_string(),
        _ => input.to_string(),
    })
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
