//! Auth commands - Login, Logout, and Status per sync service
//!
//! Provides the `feedsync auth` CLI subcommands:
//! 1. `login dropbox`  - Runs the OAuth2 PKCE flow. The redirect is captured
//!    by a loopback server when the redirect URI points at localhost,
//!    otherwise the user pastes the URL the browser landed on.
//! 2. `login miniflux` - Stores the server URL and API token after checking
//!    them against the server.
//! 3. `logout` - Clears the stored credentials of one service.
//! 4. `status` - Lists the services and which one drives sync.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use feedsync_cloud::callback::{is_loopback, LocalCallbackServer};
use feedsync_cloud::OAuthManager;
use feedsync_core::domain::{ServiceType, User};
use feedsync_core::ports::{IAggregatorApi, IFileCloudServiceProvider, IUserRepository};

use super::ServiceArg;
use crate::context::AppContext;
use crate::output::OutputFormatter;
use crate::GlobalOpts;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in to a sync service
    Login {
        service: ServiceArg,
        /// Miniflux server URL
        #[arg(long, required_if_eq("service", "miniflux"))]
        server: Option<String>,
        /// Miniflux API token
        #[arg(long, required_if_eq("service", "miniflux"))]
        token: Option<String>,
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Remove stored credentials
    Logout { service: ServiceArg },
    /// Show which services are signed in
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, opts: &GlobalOpts) -> Result<()> {
        let fmt = opts.format.formatter();
        let ctx = AppContext::open(&opts.config_path).await?;

        match self {
            AuthCommand::Login {
                service: ServiceArg::Dropbox,
                no_browser,
                ..
            } => login_dropbox(&ctx, *no_browser, &*fmt).await,
            AuthCommand::Login {
                service: ServiceArg::Miniflux,
                server,
                token,
                ..
            } => {
                let server = server.as_deref().context("--server is required")?;
                let token = token.as_deref().context("--token is required")?;
                login_miniflux(&ctx, server, token, &*fmt).await
            }
            AuthCommand::Logout { service } => logout(&ctx, (*service).into(), &*fmt).await,
            AuthCommand::Status => status(&ctx, opts, &*fmt).await,
        }
    }
}

async fn login_dropbox(ctx: &AppContext, no_browser: bool, fmt: &dyn OutputFormatter) -> Result<()> {
    let redirect_uri = ctx.config.dropbox.redirect_uri.clone();
    let manager = OAuthManager::new(ctx.config.dropbox.clone(), ctx.store.clone());
    let url = manager.auth_url(ServiceType::Dropbox)?;

    let redirect = if is_loopback(&redirect_uri) {
        // Listen before the browser can hit the redirect
        let server = LocalCallbackServer::bind(&redirect_uri).await?;
        present_url(&url, no_browser, fmt);
        fmt.info("Waiting for the browser to complete sign-in...");
        tokio::time::timeout(LOGIN_TIMEOUT, server.wait_for_redirect())
            .await
            .context("Timed out waiting for the authorization redirect")??
    } else {
        present_url(&url, no_browser, fmt);
        println!("Paste the URL your browser was redirected to:");
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("Failed to read the redirect URL")?;
        line.trim().to_string()
    };

    if !manager.handle_redirect(&redirect).await {
        bail!("Dropbox authorization failed");
    }

    info!("Signed in to Dropbox");
    fmt.success("Signed in to Dropbox");
    Ok(())
}

fn present_url(url: &str, no_browser: bool, fmt: &dyn OutputFormatter) {
    if !no_browser {
        match webbrowser::open(url) {
            Ok(()) => {
                fmt.info("Opened the Dropbox authorization page in your browser");
                return;
            }
            Err(e) => warn!(error = %e, "Could not open a browser"),
        }
    }
    println!("Open this URL to authorize FeedSync:");
    println!("{url}");
}

async fn login_miniflux(
    ctx: &AppContext,
    server: &str,
    token: &str,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let mut user = User::placeholder(ServiceType::Miniflux);
    user.token = token.to_string();
    user.server_url = Some(server.trim_end_matches('/').to_string());
    ctx.store.save_user(&user).await?;

    match ctx.miniflux().subscriptions().await {
        Ok(subscriptions) => {
            info!(server, "Signed in to Miniflux");
            fmt.success(&format!("Signed in to Miniflux at {server}"));
            fmt.info(&format!("{} subscriptions on the server", subscriptions.len()));
            Ok(())
        }
        Err(e) => {
            ctx.store.delete_user(ServiceType::Miniflux).await?;
            Err(e.context("Miniflux rejected the credentials"))
        }
    }
}

async fn logout(ctx: &AppContext, service: ServiceType, fmt: &dyn OutputFormatter) -> Result<()> {
    match service {
        ServiceType::Dropbox => ctx.dropbox().sign_out().await,
        ServiceType::Miniflux => ctx.store.delete_user(service).await?,
    }
    fmt.success(&format!("Signed out of {service}"));
    Ok(())
}

async fn status(ctx: &AppContext, opts: &GlobalOpts, fmt: &dyn OutputFormatter) -> Result<()> {
    let users = ctx.store.users().await?;
    let active = ctx.store.current_user().await?.map(|u| u.service);

    if opts.format.is_json() {
        let services: Vec<serde_json::Value> = ServiceType::ALL
            .iter()
            .map(|service| {
                let user = users.iter().find(|u| u.service == *service);
                serde_json::json!({
                    "service": service.as_str(),
                    "signed_in": user.is_some_and(|u| u.is_signed_in()),
                    "server_url": user.and_then(|u| u.server_url.clone()),
                    "active": active == Some(*service),
                })
            })
            .collect();
        fmt.print_json(&serde_json::json!({ "services": services }));
        return Ok(());
    }

    match active {
        Some(service) => fmt.success(&format!("Syncing with {service}")),
        None => fmt.info("Not signed in; feeds are refreshed locally only"),
    }
    for service in ServiceType::ALL {
        let user = users.iter().find(|u| u.service == service);
        let state = match user {
            Some(u) if u.is_signed_in() => match &u.server_url {
                Some(url) => format!("signed in ({url})"),
                None => "signed in".to_string(),
            },
            _ => "signed out".to_string(),
        };
        fmt.info(&format!("{:<10} {}", service.as_str(), state));
    }
    Ok(())
}
