mod chat;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tutor::api::ApiClient;
use tutor::materials::{ValidationError, parse_materials};
use tutor::subscription::{BillingCycle, Plan, PollOutcome, SubscriptionClient, poll_until_active};
use tutor::{
    FileStorage, Gender, GatewayError, HttpAskGateway, LanguageMode, PreferenceStore, ProficiencyLevel, Storage,
    StorageError, Week,
};

use crate::session::SavedSession;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("not logged in; run `lisan login request <email>` or pass --session-token")]
    NotLoggedIn,
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("local storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("materials rejected:\n  {}", .0.join("\n  "))]
    Materials(Vec<String>),
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        Self::Materials(err.messages())
    }
}

#[derive(Parser, Debug)]
#[command(name = "lisan", about = "Lisan Arabic tutor: chat, account, and admin CLI")]
struct Cli {
    #[arg(long, env = "LISAN_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "LISAN_SESSION_TOKEN")]
    session_token: Option<String>,

    /// Directory for preferences, chat history, and the saved login.
    #[arg(long, env = "LISAN_STATE_DIR", default_value = ".lisan")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Login(LoginCommand),
    Logout,
    Whoami,
    Prefs(PrefsCommand),
    /// Chat with the tutor interactively.
    Chat {
        /// Start a new conversation instead of resuming.
        #[arg(long, default_value_t = false)]
        new: bool,
    },
    Logs(LogsCommand),
    Materials(MaterialsCommand),
    Subscription(SubscriptionCommand),
}

#[derive(Args, Debug)]
struct LoginCommand {
    #[command(subcommand)]
    command: LoginSubcommand,
}

#[derive(Subcommand, Debug)]
enum LoginSubcommand {
    /// E-mail a one-time access code.
    Request { email: String },
    /// Exchange the code for a saved session.
    Verify { email: String, code: String },
}

#[derive(Args, Debug)]
struct PrefsCommand {
    #[command(subcommand)]
    command: PrefsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PrefsSubcommand {
    Show,
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        level: Option<ProficiencyLevel>,
        #[arg(long)]
        week: Option<Week>,
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long)]
        language: Option<LanguageMode>,
    },
}

#[derive(Args, Debug)]
struct LogsCommand {
    #[command(subcommand)]
    command: LogsSubcommand,
}

#[derive(Subcommand, Debug)]
enum LogsSubcommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        user_email: Option<String>,
        /// YYYY-MM-DD or RFC 3339.
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    Get { session_id: String },
    Delete { session_id: String },
    DeleteAll {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct MaterialsCommand {
    #[command(subcommand)]
    command: MaterialsSubcommand,
}

#[derive(Subcommand, Debug)]
enum MaterialsSubcommand {
    /// Validate a JSON file locally, then upload it.
    Upload { file: PathBuf },
    Show {
        #[arg(long, default_value = "beginner")]
        level: ProficiencyLevel,
        #[arg(long, default_value = "1")]
        week: Week,
    },
}

#[derive(Args, Debug)]
struct SubscriptionCommand {
    #[command(subcommand)]
    command: SubscriptionSubcommand,
}

#[derive(Subcommand, Debug)]
enum SubscriptionSubcommand {
    Status,
    Checkout {
        #[arg(long, default_value = "premium")]
        plan: Plan,
        #[arg(long, default_value = "monthly")]
        cycle: BillingCycle,
        /// Poll until the payment is confirmed.
        #[arg(long, default_value_t = false)]
        wait: bool,
        #[arg(long, default_value_t = 5)]
        poll_secs: u64,
        #[arg(long, default_value_t = 60)]
        max_attempts: u32,
    },
    Cancel,
}

struct CliContext {
    base_url: String,
    storage: Arc<FileStorage>,
    saved: Option<SavedSession>,
    token: Option<String>,
}

impl CliContext {
    fn api(&self) -> Result<ApiClient, CliError> {
        Ok(ApiClient::new(&self.base_url, self.token.clone())?)
    }

    fn authed_api(&self) -> Result<ApiClient, CliError> {
        if self.token.is_none() {
            return Err(CliError::NotLoggedIn);
        }
        self.api()
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = Arc::new(FileStorage::open(&cli.state_dir)?);
    let saved = session::load(storage.as_ref());
    let token = session::effective_token(cli.session_token.as_deref(), saved.as_ref());
    let ctx = CliContext { base_url: cli.base_url, storage, saved, token };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Login(login) => run_login(&ctx, login).await,
        Command::Logout => run_logout(&ctx).await,
        Command::Whoami => print_json(&ctx.authed_api()?.get_json::<Value>("/api/auth/me").await?),
        Command::Prefs(prefs) => run_prefs(&ctx, prefs),
        Command::Chat { new } => run_chat(&ctx, new).await,
        Command::Logs(logs) => run_logs(&ctx, logs).await,
        Command::Materials(materials) => run_materials(&ctx, materials).await,
        Command::Subscription(sub) => run_subscription(&ctx, sub).await,
    }
}

async fn run_ping(ctx: &CliContext) -> Result<(), CliError> {
    ctx.api()?.request(Method::GET, "/healthz", None).await?;
    println!("ok");
    Ok(())
}

async fn run_login(ctx: &CliContext, login: LoginCommand) -> Result<(), CliError> {
    let api = ctx.api()?;
    match login.command {
        LoginSubcommand::Request { email } => {
            api.request(Method::POST, "/api/auth/email/request-code", Some(&json!({ "email": email })))
                .await?;
            eprintln!("code sent to {email}; run `lisan login verify {email} <code>`");
            Ok(())
        }
        LoginSubcommand::Verify { email, code } => {
            let body = json!({ "email": email, "code": code });
            let response = api
                .request(Method::POST, "/api/auth/email/verify-code", Some(&body))
                .await?;
            let token = response["token"].as_str().ok_or(CliError::MissingField("token"))?;
            let user = &response["user"];
            let saved = SavedSession {
                token: token.to_owned(),
                email: user["email"].as_str().unwrap_or(&email).to_owned(),
                name: user["name"].as_str().unwrap_or_default().to_owned(),
            };
            session::save(ctx.storage.as_ref(), &saved)?;
            eprintln!("logged in as {}", saved.email);
            Ok(())
        }
    }
}

async fn run_logout(ctx: &CliContext) -> Result<(), CliError> {
    if let Ok(api) = ctx.authed_api() {
        if let Err(e) = api.request(Method::POST, "/api/auth/logout", None).await {
            tracing::warn!(error = %e, "server logout failed; clearing local login anyway");
        }
    }
    session::clear(ctx.storage.as_ref())?;
    eprintln!("logged out");
    Ok(())
}

fn run_prefs(ctx: &CliContext, prefs: PrefsCommand) -> Result<(), CliError> {
    let store = PreferenceStore::new(ctx.storage.clone());
    let auth_name = ctx.saved.as_ref().map(|s| s.name.as_str());
    let mut current = store.load_or_default(auth_name);
    match prefs.command {
        PrefsSubcommand::Show => {}
        PrefsSubcommand::Set { name, level, week, gender, language } => {
            if let Some(name) = name {
                current.display_name = name;
            }
            if let Some(level) = level {
                current.proficiency_level = level;
            }
            if let Some(week) = week {
                current.week = week;
            }
            if let Some(gender) = gender {
                current.gender = gender;
            }
            if let Some(language) = language {
                current.language = language;
            }
            store.try_save(&current)?;
        }
    }
    print_json(&serde_json::to_value(&current)?)
}

async fn run_chat(ctx: &CliContext, fresh: bool) -> Result<(), CliError> {
    let api = ctx.api()?;
    let identity = match &ctx.saved {
        Some(saved) if ctx.token.as_deref() == Some(saved.token.as_str()) => saved.identity(),
        _ => tutor::resolve_identity(None),
    };
    let entitled = if ctx.token.is_some() {
        match SubscriptionClient::new(api.clone()).status().await {
            Ok(view) => view.entitled,
            Err(e) => {
                tracing::warn!(error = %e, "subscription status unavailable; assuming free tier");
                false
            }
        }
    } else {
        false
    };

    let auth_name = ctx.saved.as_ref().map(|s| s.name.as_str());
    let prefs = PreferenceStore::new(ctx.storage.clone()).load_or_default(auth_name);
    let storage: Arc<dyn Storage> = ctx.storage.clone();
    chat::run(chat::ChatSetup {
        storage,
        gateway: HttpAskGateway::new(api),
        identity,
        entitled,
        prefs,
        fresh,
    })
    .await
}

/// Query string for the chat log listing; blank values are left out.
fn logs_query(pairs: &[(&str, Option<String>)]) -> String {
    let encoded: Vec<String> = pairs
        .iter()
        .filter_map(|(key, value)| {
            let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
            Some(format!("{key}={}", encode_component(value)))
        })
        .collect();
    if encoded.is_empty() { String::new() } else { format!("?{}", encoded.join("&")) }
}

fn encode_component(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

async fn run_logs(ctx: &CliContext, logs: LogsCommand) -> Result<(), CliError> {
    let api = ctx.authed_api()?;
    match logs.command {
        LogsSubcommand::List { page, page_size, search, user_id, user_email, from, to } => {
            let query = logs_query(&[
                ("page", Some(page.to_string())),
                ("pageSize", Some(page_size.to_string())),
                ("searchTerm", search),
                ("userId", user_id),
                ("userEmail", user_email),
                ("dateFrom", from),
                ("dateTo", to),
            ]);
            print_json(&api.get_json::<Value>(&format!("/api/chatlogs{query}")).await?)
        }
        LogsSubcommand::Get { session_id } => {
            print_json(&api.get_json::<Value>(&format!("/api/chatlogs/{}", encode_component(&session_id))).await?)
        }
        LogsSubcommand::Delete { session_id } => {
            print_json(&api.delete_json::<Value>(&format!("/api/chatlogs/{}", encode_component(&session_id))).await?)
        }
        LogsSubcommand::DeleteAll { yes } => {
            if !yes {
                eprintln!("refusing to delete every chat log without --yes");
                return Ok(());
            }
            print_json(&api.delete_json::<Value>("/api/chatlogs").await?)
        }
    }
}

async fn run_materials(ctx: &CliContext, materials: MaterialsCommand) -> Result<(), CliError> {
    let api = ctx.authed_api()?;
    match materials.command {
        MaterialsSubcommand::Upload { file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let items = parse_materials(&raw)?;
            eprintln!("{} item(s) valid; uploading", items.len());
            print_json(&api.post_json::<_, Value>("/api/materials", &items).await?)
        }
        MaterialsSubcommand::Show { level, week } => {
            let path = format!("/api/materials?level={}&week={}", level.as_str(), week.number());
            print_json(&api.get_json::<Value>(&path).await?)
        }
    }
}

async fn run_subscription(ctx: &CliContext, sub: SubscriptionCommand) -> Result<(), CliError> {
    let client = SubscriptionClient::new(ctx.authed_api()?);
    match sub.command {
        SubscriptionSubcommand::Status => print_json(&serde_json::to_value(client.status().await?)?),
        SubscriptionSubcommand::Cancel => print_json(&serde_json::to_value(client.cancel().await?)?),
        SubscriptionSubcommand::Checkout { plan, cycle, wait, poll_secs, max_attempts } => {
            let url = client.checkout(plan, cycle).await?;
            println!("{url}");
            if !wait {
                return Ok(());
            }

            eprintln!("open the link above to pay; waiting for confirmation (Ctrl-C to stop)");
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });
            let outcome = poll_until_active(&client, Duration::from_secs(poll_secs.max(1)), max_attempts, cancel).await;
            match outcome {
                PollOutcome::Activated => eprintln!("premium is active"),
                PollOutcome::TimedOut => eprintln!("payment not confirmed yet; check `lisan subscription status` later"),
                PollOutcome::Cancelled => eprintln!("stopped waiting"),
            }
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
