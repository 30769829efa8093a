mod ack;
mod agent_spec;
mod cli;
mod config;
mod delivery;
mod error;
mod history;
mod logging;
mod mail;
mod mux;
mod paths;
mod robot;
mod routing;
mod session;
mod workspace;

use agent_spec::registry::Registry;
use agent_spec::{AgentType, FlatAgent};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use mux::tmux::TmuxDriver;
use mux::MuxDriver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "pf", version, about = "paneforge — orchestrate multi-agent AI coding sessions over tmux")]
struct Cli {
    /// Project directory. Defaults to the nearest git root, then cwd.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Emit exactly one JSON document on stdout and use the mapped exit
    /// code, instead of human-readable text.
    #[arg(long, global = true)]
    robot: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new session with the given agent fleet.
    Spawn {
        /// Session name. Defaults to the project directory's base name.
        #[arg(long)]
        name: Option<String>,
        /// Agent tokens, e.g. `cc=2`, `cod=1:gpt-4.1`, or `cc=1:persona:reviewer`.
        /// Ignored when `--recipe` is given.
        agents: Vec<String>,
        /// Spawn a named recipe's pre-baked agent list instead of parsing `agents`.
        #[arg(long)]
        recipe: Option<String>,
        #[arg(long)]
        no_user_pane: bool,
    },
    /// Append agents to an existing session.
    AddAgent {
        session: String,
        /// Agent tokens, e.g. `cc=2`, `cod=1:gpt-4.1`, or `cc=1:persona:reviewer`.
        agents: Vec<String>,
    },
    /// Deliver a prompt to a set of panes.
    Send {
        session: String,
        prompt: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long = "type", value_name = "TYPE")]
        by_type: Vec<String>,
        #[arg(long = "pane")]
        panes: Vec<String>,
        #[arg(long)]
        tag: Vec<String>,
        #[arg(long)]
        exclude: Vec<u32>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        include_user: bool,
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long, default_value = "")]
        suffix: String,
        #[arg(long, default_value_t = 0)]
        stagger_ms: u64,
        #[arg(long)]
        dry_run: bool,
    },
    /// Resolve a target expression without sending anything.
    Route {
        session: String,
        #[arg(long = "type", value_name = "TYPE")]
        by_type: Vec<String>,
        #[arg(long = "pane")]
        panes: Vec<String>,
        #[arg(long)]
        tag: Vec<String>,
        #[arg(long)]
        exclude: Vec<u32>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        include_user: bool,
    },
    /// Wait for acknowledgement of a prior send.
    Ack {
        session: String,
        #[arg(long = "pane")]
        panes: Vec<String>,
        #[arg(long)]
        msg: Option<String>,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
    /// Wait for panes to reach a state.
    Wait {
        session: String,
        #[arg(long = "pane")]
        panes: Vec<String>,
        #[arg(long, default_value = "idle")]
        condition: String,
        #[arg(long, default_value = "all")]
        mode: String,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
        #[arg(long)]
        exit_on_error: bool,
    },
    /// Show a session's panes.
    Status { session: String },
    /// Capture recent scrollback from a set of panes.
    Tail {
        session: String,
        #[arg(long = "pane")]
        panes: Vec<String>,
        #[arg(long, default_value_t = 100)]
        lines: u32,
    },
    /// Parse and flatten agent tokens without spawning anything.
    Tokens { agents: Vec<String> },
    /// Send Ctrl-C to a set of panes.
    Interrupt {
        session: String,
        #[arg(long = "pane")]
        panes: Vec<String>,
    },
    /// Terminate a session.
    Kill { session: String },
    /// Persist a session's layout to disk.
    Save {
        session: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Re-materialise a saved snapshot as a new session.
    Restore {
        snapshot: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        launch_agents: bool,
    },
    /// Inspect the append-only send history.
    History {
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Agent Mail coordination.
    Mail {
        #[command(subcommand)]
        action: MailAction,
    },
    /// Diagnose installation health.
    Doctor,
    /// Dump the merged effective configuration.
    Config,
    /// Emit the JSON Schema for a named payload type.
    Schema { name: String },
    /// List the merged persona/recipe registry (builtin, user, project tiers).
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
    /// Thin, intentionally-unimplemented scheduling-assignment surface.
    Assign,
    /// Thin, intentionally-unimplemented multi-step pipeline surface.
    Pipeline,
}

#[derive(Subcommand, Debug)]
enum MailAction {
    /// Probe whether Agent Mail is reachable.
    Status,
    /// List agents registered for this project.
    Agents,
    /// Fetch an agent's inbox.
    Inbox {
        agent: String,
        #[arg(long)]
        urgent_only: bool,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long)]
        include_bodies: bool,
    },
    /// Mark a message read.
    MarkRead { message_id: String },
    /// Acknowledge a message.
    Ack { message_id: String },
    /// List active file reservations for this project.
    Reservations,
    /// Release all reservations held by an agent.
    ReleaseReservations { agent: String },
    /// Send a message as the Human Overseer.
    Send { to: String, body: String },
}

#[derive(Subcommand, Debug)]
enum RegistryAction {
    /// List all personas, sorted by name.
    Personas,
    /// List all recipes, sorted by name.
    Recipes,
}

fn session_label(name: &str, pane: &session::Pane) -> String {
    format!("{name}:{}", pane.index)
}

/// Parse tokens like `cc=2` or `cod=1:gpt-4.1` into `AgentSpec`s, preserving
/// declaration order across types (flatten re-indexes per type later). A
/// model portion of the form `persona:NAME` resolves through the registry
/// instead of being taken as a literal model string — the persona's own
/// type must match the token's type.
fn parse_agent_tokens(tokens: &[String], registry: &Registry) -> Result<Vec<agent_spec::AgentSpec>> {
    tokens
        .iter()
        .map(|token| {
            let (type_str, spec_str) = token
                .split_once('=')
                .ok_or_else(|| anyhow!("agent token {token:?} must be TYPE=SPEC, e.g. cc=2"))?;
            let agent_type = AgentType::from_code(type_str)
                .ok_or_else(|| anyhow!("unknown agent type {type_str:?}; expected cc, cod, or gmi"))?;

            let (count_str, persona_name) = match spec_str.split_once(":persona:") {
                Some((count, name)) => (count, Some(name)),
                None => (spec_str, None),
            };

            match persona_name {
                Some(name) => {
                    let persona = registry.persona(name).ok_or_else(|| {
                        anyhow::Error::new(error::PaneforgeError::NotFound(format!(
                            "no persona named {name:?}"
                        )))
                    })?;
                    if persona.agent_type != agent_type {
                        return Err(anyhow!(
                            "persona {name:?} is a {} persona, not {type_str:?}",
                            persona.agent_type
                        ));
                    }
                    agent_spec::parse(agent_type, &format!("{count_str}:{}", persona.model))
                        .map_err(anyhow::Error::new)
                }
                None => agent_spec::parse(agent_type, spec_str).map_err(anyhow::Error::new),
            }
        })
        .collect()
}

fn parse_by_types(tokens: &[String]) -> Result<Vec<AgentType>> {
    tokens
        .iter()
        .map(|t| AgentType::from_code(t).ok_or_else(|| anyhow!("unknown agent type {t:?}")))
        .collect()
}

fn build_target(
    by_type: &[String],
    panes: &[String],
    tags: &[String],
    exclude: &[u32],
    all: bool,
    include_user: bool,
) -> Result<routing::TargetExpr> {
    Ok(routing::TargetExpr {
        all,
        by_type: parse_by_types(by_type)?,
        pane_indices: panes.to_vec(),
        pane_ids: Vec::new(),
        tags: tags.to_vec(),
        exclude_indices: exclude.to_vec(),
        include_user,
    })
}

struct App {
    config: Config,
    config_paths: Vec<PathBuf>,
    mux: Arc<dyn MuxDriver>,
    project_dir: PathBuf,
    history: history::HistoryLog,
    registry: Registry,
}

impl App {
    async fn panes(&self, session: &str) -> error::Result<Vec<session::Pane>> {
        self.mux.get_panes(session).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = workspace::resolve_project_dir(cli.dir.clone())?;
    let (config, config_paths) = config::Config::load(Some(project_dir.as_path()))
        .unwrap_or_else(|_| (Config::default(), Vec::new()));

    let _ = logging::setup_tracing_with_settings(logging::LoggingSettings {
        level: config.logging.level.as_deref(),
        directory: config.logging.directory.as_deref(),
        retention_days: config.logging.retention_days,
        suppress_stdout: cli.robot,
    });

    let history_path = config.history.path.clone().unwrap_or_else(paths::history_file);
    let registry = load_registry(&project_dir).unwrap_or_else(|_| Registry::load(None, None).unwrap_or_default());
    let app = App {
        mux: Arc::new(TmuxDriver::default()),
        project_dir,
        history: history::HistoryLog::new(history_path),
        config_paths,
        config,
        registry,
    };

    let exit_code = run(&app, cli.cmd, cli.robot).await;
    std::process::exit(exit_code);
}

async fn run(app: &App, cmd: Command, robot: bool) -> i32 {
    let result = dispatch(app, cmd, robot).await;
    match result {
        Ok(Some(value)) if robot => {
            println!("{value}");
            0
        }
        Ok(_) => 0,
        Err(e) => {
            if robot {
                if let Some(pf_err) = e.downcast_ref::<error::PaneforgeError>() {
                    println!("{}", pf_err.to_robot_json());
                    return pf_err.exit_code();
                }
                println!(
                    "{}",
                    serde_json::json!({"success": false, "error": e.to_string(), "error_code": "runtime_error"})
                );
                1
            } else {
                eprintln!("error: {e:#}");
                1
            }
        }
    }
}

async fn dispatch(app: &App, cmd: Command, robot: bool) -> Result<Option<serde_json::Value>> {
    match cmd {
        Command::Spawn { name, agents, recipe, no_user_pane } => {
            let session_name = name.unwrap_or_else(|| default_session_name(&app.project_dir));
            let flat: Vec<FlatAgent> = match recipe {
                Some(recipe_name) => {
                    let recipe = app.registry.recipe(&recipe_name).ok_or_else(|| {
                        anyhow::Error::new(error::PaneforgeError::NotFound(format!(
                            "no recipe named {recipe_name:?}"
                        )))
                    })?;
                    recipe
                        .agents
                        .iter()
                        .map(|a| FlatAgent {
                            agent_type: a.agent_type,
                            index: a.index,
                            model: agent_spec::resolve_model(a.agent_type, &a.model, &app.config),
                        })
                        .collect()
                }
                None => {
                    let specs = parse_agent_tokens(&agents, &app.registry)?;
                    agent_spec::flatten(&specs)
                }
            };
            let (session, first_error) =
                session::spawn(&app.mux, &app.config, &session_name, &flat, !no_user_pane, &app.project_dir).await;
            if let Some(e) = first_error {
                return Err(anyhow::Error::new(e).context("spawn completed with a partial failure"));
            }
            if robot {
                return Ok(Some(robot::session_status_json(&session)));
            }
            println!("spawned session {session_name:?} with {} panes", session.panes.len());
            Ok(None)
        }

        Command::AddAgent { session, agents } => {
            let specs = parse_agent_tokens(&agents, &app.registry)?;
            let flat = agent_spec::flatten(&specs);
            let tokens: Vec<(AgentType, Option<String>)> = flat
                .into_iter()
                .map(|a| (a.agent_type, if a.model.is_empty() { None } else { Some(a.model) }))
                .collect();
            let (panes, first_error) =
                session::add_agents(&app.mux, &app.config, &session, &tokens, &app.project_dir).await;
            if let Some(e) = first_error {
                return Err(anyhow::Error::new(e));
            }
            if robot {
                return Ok(Some(robot::route_json(&panes)));
            }
            println!("added {} panes to {session:?}", panes.len());
            Ok(None)
        }

        Command::Send {
            session,
            prompt,
            file,
            by_type,
            panes,
            tag,
            exclude,
            all,
            include_user,
            prefix,
            suffix,
            stagger_ms,
            dry_run,
        } => {
            let content = resolve_prompt_content(prompt, file)?;
            let target = build_target(&by_type, &panes, &tag, &exclude, all, include_user)?;
            let inventory = app.panes(&session).await.context("fetching pane inventory")?;
            let opts = delivery::SendOpts {
                prefix,
                suffix,
                stagger_delay: Duration::from_millis(stagger_ms),
                dry_run,
                skip_first: false,
            };
            let outcome = delivery::send(&app.mux, &session, &content, &target, &inventory, &opts)
                .await
                .map_err(anyhow::Error::new)?;

            if !dry_run {
                let ts = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                let entry = history::HistoryEntry {
                    id: history::new_id(),
                    ts,
                    session: session.clone(),
                    targets: outcome.targets.clone(),
                    prompt: content.clone(),
                    source: history::HistorySource::Cli,
                    template: None,
                    success: outcome.failures.is_empty(),
                    error: outcome.failures.first().map(|f| f.error.clone()),
                    duration_ms: outcome.duration_ms,
                };
                app.history.append(&entry).context("writing history entry")?;
            }

            if robot {
                return Ok(Some(robot::send_json(&outcome)));
            }
            println!(
                "sent to {} panes ({} ok, {} failed)",
                outcome.targets.len(),
                outcome.successes.len(),
                outcome.failures.len()
            );
            Ok(None)
        }

        Command::Route { session, by_type, panes, tag, exclude, all, include_user } => {
            let target = build_target(&by_type, &panes, &tag, &exclude, all, include_user)?;
            let inventory = app.panes(&session).await.context("fetching pane inventory")?;
            let resolved = routing::resolve(&target, &inventory).map_err(anyhow::Error::new)?;
            if robot {
                return Ok(Some(robot::route_json(&resolved)));
            }
            for pane in &resolved {
                println!("{}", session_label(&session, pane));
            }
            Ok(None)
        }

        Command::Ack { session, panes, msg, timeout_secs, poll_ms } => {
            let inventory = select_panes(app, &session, &panes).await?;
            let cancel = tokio_util::sync::CancellationToken::new();
            let outcome = ack::ack(
                &app.mux,
                &inventory,
                msg.as_deref(),
                Duration::from_secs(timeout_secs),
                Duration::from_millis(poll_ms),
                &app.config.ack,
                &cancel,
            )
            .await;
            let (body, code) = robot::render_ack(&outcome);
            if robot {
                return finish_with_code(code, Some(body));
            }
            println!("ack: {} panes, timed_out={}", outcome.results.len(), outcome.timed_out);
            finish_with_code(code, None)
        }

        Command::Wait { session, panes, condition, mode, timeout_secs, poll_ms, exit_on_error } => {
            let inventory = select_panes(app, &session, &panes).await?;
            let condition = parse_condition(&condition)?;
            let mode = parse_mode(&mode)?;
            let cancel = tokio_util::sync::CancellationToken::new();
            let outcome = ack::wait(
                &app.mux,
                &inventory,
                condition,
                Duration::from_secs(timeout_secs),
                Duration::from_millis(poll_ms),
                mode,
                exit_on_error,
                &app.config.ack,
                &cancel,
            )
            .await;
            let (body, code) = robot::render_wait(&outcome);
            if robot {
                return finish_with_code(code, Some(body));
            }
            println!("wait: satisfied={} error_seen={}", outcome.satisfied, outcome.error_seen);
            finish_with_code(code, None)
        }

        Command::Status { session } => {
            let panes = app.panes(&session).await.map_err(anyhow::Error::new)?;
            let summary = session::Session {
                name: session.clone(),
                work_dir: app.project_dir.clone(),
                layout: "tiled".to_string(),
                agents_summary: panes
                    .iter()
                    .filter(|p| p.agent_type != AgentType::User)
                    .fold(std::collections::HashMap::new(), |mut acc, p| {
                        *acc.entry(p.agent_type.code().to_string()).or_insert(0u32) += 1;
                        acc
                    }),
                panes,
                git: None,
            };
            let reservations = fetch_reservations(app).await;

            if robot {
                let mut body = robot::session_status_json(&summary);
                if let (Some(reservations), serde_json::Value::Object(map)) = (&reservations, &mut body) {
                    map.insert("reservations".to_string(), serde_json::json!(reservations));
                }
                return Ok(Some(body));
            }
            for pane in &summary.panes {
                println!("{:>2}  {:<5}  {}", pane.index, pane.agent_type, pane.title);
            }
            match &reservations {
                Some(list) if !list.is_empty() => {
                    for r in list {
                        println!("reservation: {} held by {} (exclusive={})", r.path_pattern, r.agent_name, r.exclusive);
                    }
                }
                Some(_) => println!("reservations: none"),
                None => {}
            }
            Ok(None)
        }

        Command::Tail { session, panes, lines } => {
            let inventory = select_panes(app, &session, &panes).await?;
            let mut captures = Vec::with_capacity(inventory.len());
            for pane in &inventory {
                let text = app.mux.capture_pane_output(&pane.id, lines).await.map_err(anyhow::Error::new)?;
                captures.push(serde_json::json!({
                    "pane": session_label(&session, pane),
                    "text": text,
                }));
            }
            if robot {
                return Ok(Some(robot::ok_payload(&serde_json::json!({ "captures": captures }))));
            }
            for capture in &captures {
                println!("=== {} ===\n{}", capture["pane"], capture["text"].as_str().unwrap_or(""));
            }
            Ok(None)
        }

        Command::Tokens { agents } => {
            let specs = parse_agent_tokens(&agents, &app.registry)?;
            let flat = agent_spec::flatten(&specs);
            if robot {
                return Ok(Some(robot::flat_agents_json(&flat)));
            }
            for agent in &flat {
                println!("{}#{} {}", agent.agent_type, agent.index, agent.model);
            }
            Ok(None)
        }

        Command::Pipeline => Err(anyhow::Error::new(error::PaneforgeError::Unimplemented("pipeline"))),

        Command::Interrupt { session, panes } => {
            let inventory = select_panes(app, &session, &panes).await?;
            for pane in &inventory {
                app.mux.paste_keys(&pane.id, "\x03", false).await.map_err(anyhow::Error::new)?;
            }
            if robot {
                return Ok(Some(robot::route_json(&inventory)));
            }
            println!("interrupted {} panes", inventory.len());
            Ok(None)
        }

        Command::Kill { session } => {
            session::destroy(&app.mux, &session).await.map_err(anyhow::Error::new)?;
            if robot {
                return Ok(Some(serde_json::json!({"success": true, "session": session})));
            }
            println!("killed session {session:?}");
            Ok(None)
        }

        Command::Save { session, out } => {
            let panes = app.panes(&session).await.map_err(anyhow::Error::new)?;
            let live = session::Session {
                name: session.clone(),
                work_dir: app.project_dir.clone(),
                layout: "tiled".to_string(),
                agents_summary: std::collections::HashMap::new(),
                panes,
                git: None,
            };
            let snapshot = session::snapshot::SessionSnapshot::capture(&live);
            let dir = out.as_deref().map(|p| p.parent().unwrap_or(p).to_path_buf()).unwrap_or_else(paths::sessions_dir);
            let path = session::snapshot::save(&dir, &session, &snapshot).map_err(anyhow::Error::new)?;
            if robot {
                return Ok(Some(robot::snapshot_json(&snapshot)));
            }
            println!("saved snapshot to {}", path.display());
            Ok(None)
        }

        Command::Restore { snapshot, name, launch_agents } => {
            let dir = paths::sessions_dir();
            let loaded = session::snapshot::load(&dir, &snapshot).map_err(anyhow::Error::new)?;
            let new_name = name.unwrap_or_else(|| loaded.name.clone());
            let plan = session::snapshot::restore_plan(&loaded, launch_agents);
            let flat: Vec<FlatAgent> = plan
                .iter()
                .map(|(agent_type, index, model, _)| FlatAgent { agent_type: *agent_type, index: *index, model: model.clone() })
                .collect();
            let (restored, first_error) =
                session::spawn(&app.mux, &app.config, &new_name, &flat, true, &app.project_dir).await;
            if let Some(e) = first_error {
                return Err(anyhow::Error::new(e));
            }
            if robot {
                return Ok(Some(robot::session_status_json(&restored)));
            }
            println!("restored {:?} as {new_name:?} ({} panes)", snapshot, restored.panes.len());
            Ok(None)
        }

        Command::History { session, search } => {
            let entries = match (&session, &search) {
                (Some(s), _) => app.history.by_session(s)?,
                (None, Some(q)) => app.history.search(q)?,
                (None, None) => app.history.all()?,
            };
            if robot {
                return Ok(Some(robot::history_json(&entries)));
            }
            for entry in &entries {
                println!("{}  {}  {:?}", entry.id, entry.session, entry.prompt);
            }
            Ok(None)
        }

        Command::Mail { action } => {
            let client = mail::MailClient::new(&app.config.mail)?;

            if let MailAction::Status = action {
                let available = client.is_available().await;
                if robot {
                    return Ok(Some(serde_json::json!({"success": true, "available": available})));
                }
                println!("agent mail available: {available}");
                return Ok(None);
            }

            let key = mail::project_key(&app.project_dir);
            if !client.is_available().await {
                let unavailable =
                    anyhow::Error::new(error::PaneforgeError::CoordinationUnavailable(app.config.mail.base_url.clone()));
                return Err(unavailable);
            }
            client.ensure_project(&key).await.map_err(anyhow::Error::new)?;

            match action {
                MailAction::Status => unreachable!("handled above"),
                MailAction::Agents => {
                    let agents = client.list_project_agents(&key).await.map_err(anyhow::Error::new)?;
                    if robot {
                        return Ok(Some(serde_json::json!({"success": true, "agents": agents})));
                    }
                    for agent in agents {
                        println!("{} ({})", agent.name, agent.agent_type);
                    }
                }
                MailAction::Inbox { agent, urgent_only, limit, include_bodies } => {
                    let messages = client
                        .fetch_inbox(&key, &agent, urgent_only, limit, include_bodies)
                        .await
                        .map_err(anyhow::Error::new)?;
                    if robot {
                        return Ok(Some(serde_json::json!({"success": true, "messages": messages})));
                    }
                    for m in &messages {
                        println!("{}  from={}  urgent={}  read={}", m.id, m.from, m.urgent, m.read);
                    }
                }
                MailAction::MarkRead { message_id } => {
                    client.mark_read(&key, &message_id).await.map_err(anyhow::Error::new)?;
                    if robot {
                        return Ok(Some(serde_json::json!({"success": true, "message_id": message_id})));
                    }
                    println!("marked {message_id:?} read");
                }
                MailAction::Ack { message_id } => {
                    client.acknowledge(&key, &message_id).await.map_err(anyhow::Error::new)?;
                    if robot {
                        return Ok(Some(serde_json::json!({"success": true, "message_id": message_id})));
                    }
                    println!("acknowledged {message_id:?}");
                }
                MailAction::Reservations => {
                    let reservations = client.list_reservations(&key).await.map_err(anyhow::Error::new)?;
                    if robot {
                        return Ok(Some(serde_json::json!({"success": true, "reservations": reservations})));
                    }
                    for r in &reservations {
                        println!("{}  by={}  exclusive={}", r.path_pattern, r.agent_name, r.exclusive);
                    }
                }
                MailAction::ReleaseReservations { agent } => {
                    client.release_reservations(&key, &agent).await.map_err(anyhow::Error::new)?;
                    if robot {
                        return Ok(Some(serde_json::json!({"success": true, "agent": agent})));
                    }
                    println!("released reservations held by {agent:?}");
                }
                MailAction::Send { to, body } => {
                    client.send_overseer_message(&key, &to, &body).await.map_err(anyhow::Error::new)?;
                    if robot {
                        return Ok(Some(serde_json::json!({"success": true, "to": to})));
                    }
                    println!("sent message to {to:?}");
                }
            }
            Ok(None)
        }

        Command::Doctor => {
            cli::doctor::run(&app.config, &app.config_paths).await?;
            Ok(None)
        }

        Command::Config => {
            if robot {
                return Ok(Some(robot::ok_payload(&app.config)));
            }
            println!("{}", toml::to_string_pretty(&app.config).context("serializing config")?);
            Ok(None)
        }

        Command::Schema { name } => {
            let schema = robot::schema_for_name(&name).map_err(anyhow::Error::new)?;
            if robot {
                return Ok(Some(schema));
            }
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(None)
        }

        Command::Assign => {
            let value = robot::robot_assign().map_err(anyhow::Error::new)?;
            if robot {
                return Ok(Some(value));
            }
            println!("{value}");
            Ok(None)
        }

        Command::Registry { action } => match action {
            RegistryAction::Personas => {
                let personas = app.registry.list_personas();
                if robot {
                    return Ok(Some(robot::ok_payload(&serde_json::json!({ "personas": personas }))));
                }
                for p in personas {
                    println!("{:<12} {:<6} {:<24} {}", p.name, p.agent_type, p.model, p.description);
                }
                Ok(None)
            }
            RegistryAction::Recipes => {
                let recipes = app.registry.list_recipes();
                if robot {
                    return Ok(Some(robot::ok_payload(&serde_json::json!({ "recipes": recipes }))));
                }
                for r in recipes {
                    println!("{:<12} {:<40} {} agents", r.name, r.description, r.agents.len());
                }
                Ok(None)
            }
        },
    }
}

fn finish_with_code(code: i32, body: Option<serde_json::Value>) -> Result<Option<serde_json::Value>> {
    if code == 0 {
        return Ok(body);
    }
    if let Some(body) = body {
        println!("{body}");
    }
    std::process::exit(code);
}

async fn select_panes(app: &App, session: &str, selectors: &[String]) -> Result<Vec<session::Pane>> {
    let inventory = app.panes(session).await.map_err(anyhow::Error::new)?;
    if selectors.is_empty() {
        return Ok(inventory);
    }
    let target = routing::TargetExpr { pane_indices: selectors.to_vec(), include_user: true, ..Default::default() };
    routing::resolve(&target, &inventory).map_err(anyhow::Error::new)
}

fn parse_condition(s: &str) -> Result<ack::WaitCondition> {
    match s {
        "idle" => Ok(ack::WaitCondition::Idle),
        "complete" => Ok(ack::WaitCondition::Complete),
        "generating" => Ok(ack::WaitCondition::Generating),
        "healthy" => Ok(ack::WaitCondition::Healthy),
        other => Err(anyhow!("unknown wait condition {other:?}")),
    }
}

fn parse_mode(s: &str) -> Result<ack::WaitMode> {
    match s {
        "any" => Ok(ack::WaitMode::Any),
        "all" => Ok(ack::WaitMode::All),
        other => Err(anyhow!("unknown wait mode {other:?}")),
    }
}

fn resolve_prompt_content(prompt: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        if content.trim().is_empty() {
            return Err(anyhow!("prompt file {} is empty", path.display()));
        }
        return Ok(content);
    }
    prompt.ok_or_else(|| anyhow!("either a prompt argument or --file is required"))
}

/// Cache the external reservation list for one status read (per `spec.md`
/// §3 "the core only caches the list per session during a status read").
/// Degrades to `None` rather than failing the whole `status` call when
/// Agent Mail is unreachable.
async fn fetch_reservations(app: &App) -> Option<Vec<mail::reservations::FileReservation>> {
    let client = mail::MailClient::new(&app.config.mail).ok()?;
    if !client.is_available().await {
        return None;
    }
    let key = mail::project_key(&app.project_dir);
    let mut cache = mail::reservations::ReservationCache::new(Duration::from_secs(30));
    let list = client.list_reservations(&key).await.ok()?;
    cache.refresh(list);
    Some(cache.all().to_vec())
}

/// Load the merged persona/recipe registry: builtin ≺ user ≺ project, each
/// overlay tier read from one optional TOML file.
fn load_registry(project_dir: &std::path::Path) -> Result<Registry> {
    let user_toml = std::fs::read_to_string(paths::user_registry_file()).ok();
    let project_toml = std::fs::read_to_string(paths::project_registry_file(project_dir)).ok();
    Registry::load(user_toml.as_deref(), project_toml.as_deref())
}

fn default_session_name(project_dir: &std::path::Path) -> String {
    project_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "paneforge".to_string())
}
