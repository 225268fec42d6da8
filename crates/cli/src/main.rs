use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hushchat::api::ApiClient;
use hushchat::pipeline::Role;
use hushchat::session::{AppState, NoticeLevel, SessionController};

#[derive(Parser)]
#[command(name = "hush")]
#[command(about = "Hush CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone)]
struct Common {
    /// Config file path (default: HUSH_CONFIG_PATH or ~/.hush/config.json)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Backend base URL (overrides HUSH_BACKEND_URL and config)
    #[arg(long, value_name = "URL")]
    backend: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory, a default config.json, and the exports directory.
    Init {
        /// Config file path (default: HUSH_CONFIG_PATH or ~/.hush/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Check whether the backend is reachable.
    Health {
        #[command(flatten)]
        common: Common,
    },

    /// List the available assistant modes (built-in defaults when the backend is offline).
    Modes {
        #[command(flatten)]
        common: Common,
    },

    /// List sessions, most recent first as reported by the backend.
    Sessions {
        #[command(flatten)]
        common: Common,

        /// Print the raw session objects as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a session. With --special, the backend suggests a mode and name from a description.
    New {
        #[command(flatten)]
        common: Common,

        /// Describe what the session is for; creates a special session.
        #[arg(long, value_name = "DESCRIPTION")]
        special: Option<String>,

        /// Use this name instead of the suggested one.
        #[arg(long, requires = "special")]
        name: Option<String>,

        /// Use this mode instead of the suggested one.
        #[arg(long, requires = "special")]
        mode: Option<String>,
    },

    /// Rename a session.
    Rename {
        #[command(flatten)]
        common: Common,

        id: String,

        name: String,
    },

    /// Delete a session and its messages.
    Delete {
        #[command(flatten)]
        common: Common,

        id: String,
    },

    /// Export a session as a JSON file.
    Export {
        #[command(flatten)]
        common: Common,

        id: String,

        /// Output directory (default from config or ~/.hush/exports)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Erase all sessions and messages on the backend.
    Erase {
        #[command(flatten)]
        common: Common,

        /// Confirm the erase; nothing is deleted without it.
        #[arg(long)]
        yes: bool,
    },

    /// Show the legacy cross-session message history.
    History {
        #[command(flatten)]
        common: Common,

        /// Print the raw entries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Chat interactively. Type /help for commands.
    Chat {
        #[command(flatten)]
        common: Common,

        /// Optional existing session id to continue.
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let (label, result) = match cli.command {
        Some(Commands::Version) => {
            println!("hush {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Some(Commands::Init { config }) => ("init", run_init(config)),
        Some(Commands::Health { common }) => ("health", run_health(common).await),
        Some(Commands::Modes { common }) => ("modes", run_modes(common).await),
        Some(Commands::Sessions { common, json }) => ("sessions", run_sessions(common, json).await),
        Some(Commands::New {
            common,
            special,
            name,
            mode,
        }) => ("new", run_new(common, special, name, mode).await),
        Some(Commands::Rename { common, id, name }) => ("rename", run_rename(common, id, name).await),
        Some(Commands::Delete { common, id }) => ("delete", run_delete(common, id).await),
        Some(Commands::Export { common, id, dir }) => ("export", run_export(common, id, dir).await),
        Some(Commands::Erase { common, yes }) => ("erase", run_erase(common, yes).await),
        Some(Commands::History { common, json }) => ("history", run_history(common, json).await),
        Some(Commands::Chat { common, session }) => ("chat", run_chat(common, session).await),
        None => {
            println!("Run with --help for usage");
            return;
        }
    };

    if let Err(e) = result {
        log::error!("{} failed: {:#}", label, e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(hushchat::config::default_config_path);
    let dir = hushchat::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Load config, apply overrides, and build a controller. Nothing is fetched yet.
fn open(common: &Common) -> anyhow::Result<SessionController<ApiClient>> {
    let (mut config, path) = hushchat::config::load_config(common.config.clone())?;
    config.backend.url = common
        .backend
        .clone()
        .or_else(|| hushchat::config::resolve_backend_url(&config));
    let client = ApiClient::from_config(&config.backend);
    log::debug!("using backend {}", client.base_url());
    let state = AppState::new(
        &hushchat::config::resolve_default_mode(&config),
        config.chat.save_history,
    );
    let export_dir = hushchat::config::resolve_export_dir(&config, &path);
    Ok(SessionController::new(client, state, export_dir))
}

/// Build a controller and load modes, sessions and the most recent conversation.
async fn connect(common: &Common) -> anyhow::Result<SessionController<ApiClient>> {
    let mut ctl = open(common)?;
    ctl.initialize().await?;
    // one-shot commands report failures through the returned error
    ctl.take_notices();
    Ok(ctl)
}

/// Connect and fail unless the backend answered the health probe.
async fn connect_online(common: &Common) -> anyhow::Result<SessionController<ApiClient>> {
    let ctl = connect(common).await?;
    if !ctl.state().is_connected() {
        anyhow::bail!(
            "backend at {} is not reachable; start it and try again",
            ctl.backend().base_url()
        );
    }
    Ok(ctl)
}

fn print_notices(ctl: &mut SessionController<ApiClient>) {
    for notice in ctl.take_notices() {
        match notice.level {
            NoticeLevel::Success => println!("{}", notice.text),
            NoticeLevel::Error => eprintln!("error: {}", notice.text),
        }
    }
}

fn print_sessions(state: &AppState) {
    if state.sessions().is_empty() {
        println!("no sessions");
        return;
    }
    for s in state.sessions() {
        let marker = if state.active_session_id() == Some(s.id.as_str()) {
            "*"
        } else {
            " "
        };
        let special = if s.is_special { " [special]" } else { "" };
        println!(
            "{} {}  {}{}  ({}, {} messages, updated {})",
            marker,
            s.id,
            s.name,
            special,
            state.modes().lookup(&s.mode).name,
            s.message_count,
            s.updated_at
        );
    }
}

fn print_modes(state: &AppState) {
    for m in state.modes().all() {
        let marker = if m.id == state.current_mode() { "*" } else { " " };
        println!("{} {:<10} {}: {}", marker, m.id, m.name, m.description);
    }
}

fn print_messages(state: &AppState) {
    for entry in state.messages() {
        match entry.role {
            Role::User => println!("you> {}", entry.text),
            Role::Assistant => println!("ai > {}", entry.text),
        }
    }
}

async fn run_health(common: Common) -> anyhow::Result<()> {
    let mut ctl = open(&common)?;
    let up = ctl.check_connection().await?;
    if up {
        println!("backend at {} is up", ctl.backend().base_url());
        Ok(())
    } else {
        anyhow::bail!(
            "Backend server is not running at {}. Please start the backend server first.",
            ctl.backend().base_url()
        )
    }
}

async fn run_modes(common: Common) -> anyhow::Result<()> {
    let ctl = connect(&common).await?;
    print_modes(ctl.state());
    Ok(())
}

async fn run_sessions(common: Common, json: bool) -> anyhow::Result<()> {
    let ctl = connect(&common).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(ctl.state().sessions())?);
    } else {
        print_sessions(ctl.state());
    }
    Ok(())
}

async fn run_new(
    common: Common,
    special: Option<String>,
    name: Option<String>,
    mode: Option<String>,
) -> anyhow::Result<()> {
    let mut ctl = connect_online(&common).await?;
    let session = match special {
        Some(description) => {
            let analysis = ctl.analyze_request(&description).await?;
            let name = name.unwrap_or(analysis.suggested_name);
            let mode = mode.unwrap_or(analysis.suggested_mode);
            ctl.create_special_session(&name, &mode, &description).await?
        }
        None => ctl.create_quick_session().await?,
    };
    print_notices(&mut ctl);
    println!("{}", session.id);
    Ok(())
}

async fn run_rename(common: Common, id: String, name: String) -> anyhow::Result<()> {
    let mut ctl = connect_online(&common).await?;
    ctl.rename_session(&id, &name).await?;
    print_notices(&mut ctl);
    Ok(())
}

async fn run_delete(common: Common, id: String) -> anyhow::Result<()> {
    let mut ctl = connect_online(&common).await?;
    ctl.delete_session(&id).await?;
    print_notices(&mut ctl);
    Ok(())
}

async fn run_export(common: Common, id: String, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let mut ctl = connect_online(&common).await?;
    if let Some(dir) = dir {
        ctl.set_export_dir(dir);
    }
    ctl.export_session(&id).await?;
    print_notices(&mut ctl);
    Ok(())
}

async fn run_erase(common: Common, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to erase all data without --yes");
    }
    let mut ctl = connect_online(&common).await?;
    ctl.erase_all_data().await?;
    print_notices(&mut ctl);
    Ok(())
}

async fn run_history(common: Common, json: bool) -> anyhow::Result<()> {
    let mut ctl = connect(&common).await?;
    let history = ctl.chat_history().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }
    if history.is_empty() {
        println!("no history");
    }
    for h in history {
        println!(
            "[{}] {} ({})",
            h.timestamp,
            h.session_name.as_deref().unwrap_or(&h.session_id),
            h.mode
        );
        println!("you> {}", h.user_message);
        println!("ai > {}", h.ai_response);
    }
    Ok(())
}

/// Print `label` and read one line. `None` at end of input.
fn read_line(label: &str) -> anyhow::Result<Option<String>> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

const REPL_HELP: &str = "\
/sessions            list sessions (* marks the active one)
/switch ID           switch to another session
/new                 start a quick session
/special DESCRIPTION create a special session from a description
/rename NAME         rename the active session
/delete [ID]         delete a session (default: active)
/export [ID]         export a session to a JSON file (default: active)
/mode [ID]           show modes or change the mode for the next message
/save on|off         turn history saving on or off
/reconnect           check the backend again
/erase               erase all data (asks for confirmation)
/exit, /quit         leave";

fn prompt_label(state: &AppState) -> String {
    let session = state
        .active_session()
        .map(|s| s.name.as_str())
        .unwrap_or("new chat");
    let offline = if state.is_connected() { "" } else { " offline" };
    format!("[{} | {}{}]> ", session, state.current_mode(), offline)
}

async fn run_chat(common: Common, session: Option<String>) -> anyhow::Result<()> {
    let mut ctl = open(&common)?;
    if let Err(e) = ctl.initialize().await {
        log::debug!("initialize: {}", e);
    }
    if !ctl.state().is_connected() {
        eprintln!(
            "Backend server is not running at {}. Start it, then type /reconnect.",
            ctl.backend().base_url()
        );
    }
    if let Some(id) = session {
        if let Err(e) = ctl.select_session(&id).await {
            log::debug!("selecting session {}: {}", id, e);
        }
    }
    print_notices(&mut ctl);
    print_messages(ctl.state());

    loop {
        let Some(input) = read_line(&prompt_label(ctl.state()))? else {
            break;
        };
        if input.is_empty() {
            continue;
        }
        if input.starts_with('/') {
            let (cmd, arg) = match input.split_once(char::is_whitespace) {
                Some((c, a)) => (c, a.trim()),
                None => (input.as_str(), ""),
            };
            if cmd.eq_ignore_ascii_case("/exit") || cmd.eq_ignore_ascii_case("/quit") {
                break;
            }
            run_slash(&mut ctl, cmd, arg).await?;
            print_notices(&mut ctl);
            continue;
        }

        let before = ctl.state().messages().len();
        if let Err(e) = ctl.send_message(&input).await {
            log::debug!("send failed: {}", e);
        }
        for entry in ctl.state().messages().iter().skip(before) {
            if entry.role == Role::Assistant {
                println!("ai > {}", entry.text);
            }
        }
        print_notices(&mut ctl);
    }

    Ok(())
}

/// Run one slash command. Operation failures surface as notices; only terminal I/O errors return.
async fn run_slash(
    ctl: &mut SessionController<ApiClient>,
    cmd: &str,
    arg: &str,
) -> anyhow::Result<()> {
    let active = ctl.state().active_session_id().map(str::to_string);
    let outcome = match cmd {
        "/help" => {
            println!("{}", REPL_HELP);
            Ok(())
        }
        "/sessions" => {
            print_sessions(ctl.state());
            Ok(())
        }
        "/switch" if !arg.is_empty() => {
            let r = ctl.select_session(arg).await;
            print_messages(ctl.state());
            r
        }
        "/new" => ctl.create_quick_session().await.map(|_| ()),
        "/special" if !arg.is_empty() => create_special(ctl, arg).await?,
        "/rename" => match active {
            Some(id) => ctl.rename_session(&id, arg).await,
            None => {
                println!("no active session to rename");
                Ok(())
            }
        },
        "/delete" => match (arg, active) {
            ("", None) => {
                println!("no active session to delete");
                Ok(())
            }
            ("", Some(id)) => ctl.delete_session(&id).await,
            (id, _) => ctl.delete_session(id).await,
        },
        "/export" => match (arg, active) {
            ("", None) => {
                println!("no active session to export");
                Ok(())
            }
            ("", Some(id)) => ctl.export_session(&id).await.map(|_| ()),
            (id, _) => ctl.export_session(id).await.map(|_| ()),
        },
        "/mode" if arg.is_empty() => {
            print_modes(ctl.state());
            Ok(())
        }
        "/mode" => ctl.set_mode(arg),
        "/save" => {
            match arg {
                "on" => ctl.set_save_history(true),
                "off" => ctl.set_save_history(false),
                _ => println!(
                    "history saving is {}",
                    if ctl.state().save_history() { "on" } else { "off" }
                ),
            }
            Ok(())
        }
        "/reconnect" => ctl.check_connection().await.map(|up| {
            println!("backend is {}", if up { "up" } else { "down" });
        }),
        "/erase" => {
            let confirm = read_line("Erase ALL sessions and messages? Type 'yes' to confirm: ")?;
            if confirm.as_deref() == Some("yes") {
                ctl.erase_all_data().await
            } else {
                println!("erase cancelled");
                Ok(())
            }
        }
        "/switch" | "/special" => {
            println!("usage: {} {}", cmd, if cmd == "/switch" { "ID" } else { "DESCRIPTION" });
            Ok(())
        }
        _ => {
            println!("unknown command {}; type /help", cmd);
            Ok(())
        }
    };
    if let Err(e) = outcome {
        log::debug!("{} failed: {}", cmd, e);
    }
    Ok(())
}

/// Two-phase special-session creation: show the suggestion, let the user edit it, then create.
async fn create_special(
    ctl: &mut SessionController<ApiClient>,
    description: &str,
) -> anyhow::Result<Result<(), hushchat::session::StoreError>> {
    let analysis = match ctl.analyze_request(description).await {
        Ok(a) => a,
        Err(e) => return Ok(Err(e)),
    };
    println!(
        "Suggested: {} ({})",
        analysis.suggested_name, analysis.mode_info.name
    );
    let name = read_line(&format!("Name [{}]: ", analysis.suggested_name))?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| analysis.suggested_name.clone());
    let mode = read_line(&format!("Mode [{}]: ", analysis.suggested_mode))?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| analysis.suggested_mode.clone());
    Ok(ctl
        .create_special_session(&name, &mode, description)
        .await
        .map(|_| ()))
}
