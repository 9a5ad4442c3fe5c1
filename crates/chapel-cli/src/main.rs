use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chapel_api::Role;
use chapel_auth::{SessionIssuer, SessionReader, SessionSecret, decode, now_epoch_secs};
use chapel_core::{
    ChapelConfig, EnvSecretStore, MemberDirectory, default_config_dir, load_config_from_dir,
    load_session_secret, write_default_config_file,
};
use chapel_gate::{GateDecision, RoutePolicy, resolve_render_role};
use chapel_runtime::AppState;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chapel", about = "Chapel sessions, role gate and site server")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the default chapel.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Issue or inspect session tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Evaluate the role gate offline
    Gate {
        #[command(subcommand)]
        command: GateCommands,
    },
    /// Resolve which shell a session renders under
    RenderRole {
        #[arg(long, value_parser = parse_role)]
        session: Role,
        #[arg(long, value_parser = parse_role)]
        requested: Option<Role>,
    },
    /// Run the site
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
}

#[derive(Debug, Subcommand)]
enum TokenCommands {
    /// Sign a session token with the configured secret
    Issue {
        #[arg(long)]
        subject: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
        /// Lifetime (e.g. "90s", "30m", "12h", "7d"). Default: session.ttl_seconds
        #[arg(long)]
        ttl: Option<String>,
    },
    /// Decode a token and verify it when the secret is available
    Inspect { token: String },
}

#[derive(Debug, Subcommand)]
enum GateCommands {
    Check {
        path: String,
        #[arg(long)]
        token: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Serve { .. }));
    let cfg_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);

    let load = || {
        load_config_from_dir(&cfg_dir)
            .with_context(|| format!("loading config from {}", cfg_dir.display()))
    };

    match cli.command {
        Commands::Init { force } => {
            let path = write_default_config_file(&cfg_dir, force)?;
            pout(
                cli.json,
                serde_json::json!({"message":"init complete","config":path}),
                &format!("Wrote {}", path.display()),
            )?;
        }
        Commands::Token { command } => match command {
            TokenCommands::Issue { subject, role, ttl } => {
                let cfg = load()?;
                let secret = require_secret(&cfg)?;
                let ttl = match ttl {
                    Some(t) => parse_ttl(&t)?,
                    None => cfg.session.ttl_seconds,
                };
                let issued = SessionIssuer::new(secret).with_ttl(ttl).issue(&subject, role)?;
                pout(
                    cli.json,
                    serde_json::json!({
                        "token": issued.token,
                        "userId": issued.payload.subject_id,
                        "role": issued.payload.role,
                        "exp": issued.payload.expires_at,
                    }),
                    &issued.token,
                )?;
            }
            TokenCommands::Inspect { token } => {
                let cfg = load()?;
                let payload = decode(&token)?;
                let verdict = match optional_secret(&cfg) {
                    Some(secret) => SessionReader::new(Some(secret), cfg.cookie_name())
                        .verify_token(&token, now_epoch_secs())
                        .map(|_| "valid".to_string())
                        .unwrap_or_else(|e| format!("rejected: {e}")),
                    None => "unverified: no session secret".to_string(),
                };
                pout(
                    cli.json,
                    serde_json::json!({
                        "userId": payload.subject_id,
                        "role": payload.role,
                        "exp": payload.expires_at,
                        "verdict": verdict,
                    }),
                    &format!(
                        "{} ({}) exp={} {verdict}",
                        payload.subject_id, payload.role, payload.expires_at
                    ),
                )?;
            }
        },
        Commands::Gate { command } => match command {
            GateCommands::Check { path, token } => {
                let cfg = load()?;
                let reader = SessionReader::new(optional_secret(&cfg), cfg.cookie_name());
                let identity = match token.as_deref() {
                    Some(t) => match reader.verify_token(t, now_epoch_secs()) {
                        Ok(p) => Some(p.identity()),
                        Err(e) => {
                            tracing::warn!("token treated as no session: {e}");
                            None
                        }
                    },
                    None => None,
                };
                let decision =
                    RoutePolicy::new(cfg.routes.clone()).decide(&path, identity.as_ref());
                let (value, text) = match &decision {
                    GateDecision::Allow => (
                        serde_json::json!({"path":path,"decision":"allow"}),
                        "allow".to_string(),
                    ),
                    GateDecision::Redirect { .. } => {
                        let location = decision.location().unwrap_or_default();
                        (
                            serde_json::json!({
                                "path": path,
                                "decision": "redirect",
                                "location": location,
                            }),
                            format!("redirect {location}"),
                        )
                    }
                };
                pout(cli.json, value, &text)?;
            }
        },
        Commands::RenderRole { session, requested } => {
            let role = resolve_render_role(session, requested);
            pout(cli.json, serde_json::json!({"render_role":role}), role.as_str())?;
        }
        Commands::Serve { bind } => {
            let cfg = load()?;
            let secret = optional_secret(&cfg);
            let members = Arc::new(MemberDirectory::from_config(&cfg.members));
            let state = AppState::new(cfg, secret, members);
            tokio::runtime::Runtime::new()?.block_on(chapel_runtime::serve(bind, state))?;
        }
    }

    Ok(())
}

fn init_tracing(serving: bool) {
    let default = if serving { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn require_secret(cfg: &ChapelConfig) -> anyhow::Result<SessionSecret> {
    let raw = load_session_secret(&EnvSecretStore, &cfg.session)?;
    Ok(SessionSecret::new(raw)?)
}

fn optional_secret(cfg: &ChapelConfig) -> Option<SessionSecret> {
    require_secret(cfg).ok()
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse().map_err(|e: chapel_api::ChapelError| e.to_string())
}

fn parse_ttl(ttl: &str) -> anyhow::Result<u64> {
    let s = ttl.trim().to_lowercase();
    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s.as_str(), 's'),
    };
    let factor = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        _ => bail!("Invalid TTL format: {ttl}. Use e.g. '90s', '30m', '12h', '7d'"),
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid TTL: {ttl}"))?;
    if n == 0 {
        bail!("TTL must be positive: {ttl}");
    }
    n.checked_mul(factor)
        .ok_or_else(|| anyhow::anyhow!("TTL too large: {ttl}"))
}

fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
