//! tenantdesk - command-line dashboard for the multi-tenant admin platform.
//!
//! Every command talks to the backend through the session-aware client, so an
//! expired access token is renewed transparently. When the session can no
//! longer be renewed the user is asked to log in again.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tenantdesk_core::models::{group_permissions, PermissionGroup};
use tenantdesk_core::{ApiClient, ApiError, ApiResponse, Config, RequestDescriptor};

/// Default page size for list commands
const DEFAULT_PAGE_LIMIT: u32 = 20;

#[derive(Debug, Parser)]
#[command(name = "tenantdesk", version, about = "Admin dashboard for the tenantdesk platform")]
struct Cli {
    /// Backend base URL (overrides TENANTDESK_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and store the session tokens
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// End the session and forget stored tokens
    Logout,
    /// Show the backend URL and whether a session is stored
    Status,
    /// Send an authenticated request and print the JSON response
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
    /// Show the logged-in account
    Whoami,
    /// List organizations
    Orgs {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: u32,
    },
    /// List users
    Users {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: u32,
    },
    /// List roles
    Roles,
    /// List permissions
    Permissions {
        /// Group by module, marking the ones granted to a role
        #[arg(long)]
        grouped: bool,
        #[arg(long, requires = "grouped")]
        role: Option<i64>,
    },
    /// Toggle permissions on a role and save the result
    RolePermissions {
        role: i64,
        /// Permission id to flip (repeatable)
        #[arg(long)]
        toggle: Vec<i64>,
        /// Select a whole module, or clear it when fully selected (repeatable)
        #[arg(long = "toggle-module")]
        toggle_module: Vec<String>,
    },
    /// Organization, user and role counts
    Dashboard,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<ApiError>().is_some_and(ApiError::requires_login) {
                eprintln!("Session expired. Please run `tenantdesk login`.");
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    let session = config.session().context("Failed to open session store")?;

    // Explicit flag beats the environment and the config file
    let client = match cli.api_url {
        Some(ref url) => ApiClient::with_timeout(url, session, config.request_timeout())?,
        None => ApiClient::from_config(&config, session)?,
    };
    debug!(base_url = client.base_url(), "Client ready");

    match cli.command {
        Command::Login { email } => login(&client, &mut config, email).await,
        Command::Logout => {
            client.logout().await?;
            println!("Logged out.");
            Ok(())
        }
        Command::Status => {
            status(&client);
            Ok(())
        }
        Command::Request { method, path, data } => raw_request(&client, &method, &path, data).await,
        Command::Whoami => {
            let user = client.current_user().await?;
            let kind = if user.is_superuser { "super-admin" } else { "user" };
            println!("{} <{}> ({})", user.display_name(), user.email, kind);
            Ok(())
        }
        Command::Orgs { page, limit } => {
            let orgs = client.list_organizations(page, limit).await?;
            for org in &orgs.items {
                let state = if org.is_active { "active" } else { "inactive" };
                println!("{:>6}  {:<32} {:<8} {}", org.id, org.name, state, org.created_display());
            }
            println!("page {} of {} ({} total)", orgs.page, orgs.total_pages(), orgs.total);
            Ok(())
        }
        Command::Users { page, limit } => {
            let users = client.list_users(page, limit).await?;
            for user in &users.items {
                println!("{:>6}  {:<32} {:<32} {}", user.id, user.display_name(), user.email, user.roles.join(", "));
            }
            println!("page {} of {} ({} total)", users.page, users.total_pages(), users.total);
            Ok(())
        }
        Command::Roles => {
            for role in client.list_roles().await? {
                println!("{:>6}  {:<24} {} permissions", role.id, role.name, role.permissions.len());
            }
            Ok(())
        }
        Command::Permissions { grouped, role } => permissions(&client, grouped, role).await,
        Command::RolePermissions { role, toggle, toggle_module } => {
            if toggle.is_empty() && toggle_module.is_empty() {
                anyhow::bail!("Nothing to change: pass --toggle <ID> or --toggle-module <MODULE>");
            }
            let updated = client.toggle_role_permissions(role, &toggle, &toggle_module).await?;
            let granted = updated.permission_ids();
            println!("{} now has {} permissions", updated.name, granted.len());
            for group in group_permissions(&client.list_permissions().await?) {
                print_group(&group, &granted, true);
            }
            Ok(())
        }
        Command::Dashboard => {
            let summary = client.dashboard_summary().await?;
            println!("Organizations: {}", summary.organizations);
            println!("Users:         {}", summary.users);
            println!("Roles:         {}", summary.roles);
            Ok(())
        }
    }
}

async fn login(client: &ApiClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    client.login(&email, &password).await?;

    config.last_email = Some(email.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    info!(email = %email, "Login complete");
    println!("Logged in as {}.", email);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn status(client: &ApiClient) {
    let session = client.session();
    println!("Backend:       {}", client.base_url());
    println!("Access token:  {}", if session.is_authenticated() { "stored" } else { "none" });
    println!("Refresh token: {}", if session.has_refresh_token() { "stored" } else { "none" });
    if let Some(updated) = session.updated_at() {
        let minutes = (chrono::Utc::now() - updated).num_minutes().max(0);
        println!("Updated:       {}m ago", minutes);
    }
}

async fn raw_request(client: &ApiClient, method: &str, path: &str, data: Option<String>) -> Result<()> {
    let mut req = RequestDescriptor::new(RequestDescriptor::parse_method(method)?, path);
    if let Some(data) = data {
        let body: serde_json::Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
        req = req.with_json(&body)?;
    }

    let response = client.request(&req).await?;
    if let Some(text) = render_body(&response)? {
        println!("{}", text);
    }
    Ok(())
}

/// Pretty JSON when the body parses, otherwise the body as the server sent it
fn render_body(response: &ApiResponse) -> Result<Option<String>> {
    match response.json::<serde_json::Value>() {
        Ok(body) if body.is_null() => Ok(None),
        Ok(body) => Ok(Some(serde_json::to_string_pretty(&body)?)),
        Err(_) if response.body.is_empty() => Ok(None),
        Err(_) => Ok(Some(response.body.clone())),
    }
}

async fn permissions(client: &ApiClient, grouped: bool, role: Option<i64>) -> Result<()> {
    let permissions = client.list_permissions().await?;
    if !grouped {
        for p in &permissions {
            println!("{:>6}  {}", p.id, p.name);
        }
        return Ok(());
    }

    let granted: BTreeSet<i64> = match role {
        Some(role_id) => client
            .list_roles()
            .await?
            .into_iter()
            .find(|r| r.id == role_id)
            .map(|r| r.permission_ids())
            .ok_or_else(|| anyhow::anyhow!("Role {} not found", role_id))?,
        None => BTreeSet::new(),
    };

    for group in group_permissions(&permissions) {
        print_group(&group, &granted, role.is_some());
    }
    Ok(())
}

fn print_group(group: &PermissionGroup, granted: &BTreeSet<i64>, with_marks: bool) {
    if with_marks {
        println!("{} ({}/{})", group.module, group.selected_count(granted), group.permissions.len());
    } else {
        println!("{}", group.module);
    }
    for p in &group.permissions {
        let mark = match (with_marks, granted.contains(&p.id)) {
            (false, _) => "  ",
            (true, true) => "[x]",
            (true, false) => "[ ]",
        };
        println!("  {} {}", mark, p.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    fn response(body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_render_body() {
        assert_eq!(
            render_body(&response(r#"{"ok":true}"#)).unwrap().as_deref(),
            Some("{\n  \"ok\": true\n}")
        );
        assert_eq!(render_body(&response("")).unwrap(), None);
        assert_eq!(render_body(&response("null")).unwrap(), None);
        assert_eq!(
            render_body(&response("<html>maintenance</html>")).unwrap().as_deref(),
            Some("<html>maintenance</html>")
        );
    }
}
