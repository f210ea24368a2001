mod app;
mod cli;
mod config;
mod crd;
mod filter;
mod forms;
mod input;
mod k8s;
mod model;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppCommand};
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use k8s::KubeGateway;
use model::{MutationOutcome, NamespaceScope, Page};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let settings = Settings::load(&args)?;
    if let Some(source) = &settings.source {
        info!("loaded config from {source}");
    }
    if args.all_namespaces && args.namespace.is_some() {
        warn!("both --all-namespaces and --namespace were provided, using all namespaces");
    }

    let gateway = KubeGateway::new(args.context.clone(), settings.request_timeout).await?;
    let namespace_scope = settings.namespace_scope(&args, gateway.default_namespace());

    let mut app = App::new(
        gateway.cluster().to_string(),
        gateway.context().to_string(),
        namespace_scope,
        settings.start_page,
    );
    app.set_user(gateway.user().to_string());
    app.set_default_namespace(gateway.default_namespace().to_string());
    app.set_time_format(settings.time_format.clone());

    run(&mut app, &gateway).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::sink),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_writer(writer)
        .try_init();

    Ok(())
}

async fn run(app: &mut App, gateway: &KubeGateway) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, gateway).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(terminal: &mut TuiTerminal, app: &mut App, gateway: &KubeGateway) -> Result<()> {
    terminal
        .draw(|frame| ui::render(frame, app))
        .context("failed to render terminal frame")?;

    execute_chain(terminal, app, gateway, AppCommand::ResolveScope).await?;
    if app.page() != Page::Rules {
        let page = app.page();
        execute_chain(terminal, app, gateway, AppCommand::Reload { page }).await?;
    }

    let mut reader = EventStream::new();

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        match reader.next().await {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                if let Some(action) = input::map_key(app.mode(), key) {
                    debug!("action={action:?}");
                    let command = app.apply_action(action);
                    execute_chain(terminal, app, gateway, command).await?;
                }
            }
            Some(Ok(_)) => {}
            Some(Err(error)) => {
                app.set_status(format!("terminal event error: {error}"));
            }
            None => {
                app.set_status("terminal event stream closed");
                break;
            }
        }
    }

    Ok(())
}

/// Runs a command and every follow-up it yields, redrawing in between so
/// progress messages are visible while a request is in flight.
async fn execute_chain(
    terminal: &mut TuiTerminal,
    app: &mut App,
    gateway: &KubeGateway,
    mut command: AppCommand,
) -> Result<()> {
    while command != AppCommand::None {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;
        command = execute_app_command(app, gateway, command).await;
    }
    Ok(())
}

async fn execute_app_command(app: &mut App, gateway: &KubeGateway, command: AppCommand) -> AppCommand {
    match command {
        AppCommand::None => AppCommand::None,
        AppCommand::Reload { page } => {
            reload_page(app, gateway, page).await;
            AppCommand::None
        }
        AppCommand::ResolveScope => {
            resolve_scope(app, gateway).await;
            AppCommand::Reload { page: Page::Rules }
        }
        AppCommand::CreateRule { namespace, rule } => {
            let outcome = gateway.create_rule(&namespace, &rule).await;
            log_transport_failure("create rule", &outcome);
            app.finish_create(Page::Rules, outcome)
        }
        AppCommand::CreateBinding { binding } => {
            let outcome = gateway.create_binding(&binding).await;
            log_transport_failure("create clusterrolebinding", &outcome);
            app.finish_create(Page::ClusterRoleBindings, outcome)
        }
        AppCommand::DeleteRule { namespace, name } => {
            let outcome = gateway.delete_rule(&namespace, &name).await;
            log_transport_failure("delete rule", &outcome);
            app.finish_delete(Page::Rules, outcome)
        }
        AppCommand::DeleteBinding { name } => {
            let outcome = gateway.delete_binding(&name).await;
            log_transport_failure("delete clusterrolebinding", &outcome);
            app.finish_delete(Page::ClusterRoleBindings, outcome)
        }
        AppCommand::LoadYaml {
            page,
            namespace,
            name,
        } => {
            let (title, result) = match (page, namespace.as_deref()) {
                (Page::Rules, Some(namespace)) => (
                    format!("{} {namespace}/{name}", page.title()),
                    gateway.rule_yaml(namespace, &name).await,
                ),
                _ => (
                    format!("{} {name}", page.title()),
                    gateway.binding_yaml(&name).await,
                ),
            };
            match result {
                Ok(content) => app.open_yaml(page, title, content),
                Err(error) => {
                    warn!("{error:#}");
                    app.set_status(format!(
                        "Failed loading YAML for {title}: {}",
                        compact_error(&error)
                    ));
                }
            }
            AppCommand::None
        }
    }
}

async fn reload_page(app: &mut App, gateway: &KubeGateway, page: Page) {
    match page {
        Page::Rules => {
            let result = gateway.list_rules(app.namespace_scope()).await;
            match result {
                Ok(items) => {
                    let rows = filter::project_rules(items, app.criteria(page));
                    app.set_rule_rows(rows);
                }
                Err(error) => {
                    warn!("{error:#}");
                    app.set_page_error(page, compact_error(&error));
                }
            }
        }
        Page::ClusterRoleBindings => match gateway.list_cluster_role_bindings().await {
            Ok(items) => {
                let rows = filter::project_bindings(items, app.criteria(page));
                app.set_binding_rows(rows);
            }
            Err(error) => {
                warn!("{error:#}");
                app.set_page_error(page, compact_error(&error));
            }
        },
    }
}

async fn resolve_scope(app: &mut App, gateway: &KubeGateway) {
    let scope = app.namespace_scope().clone();
    let namespaces = match &scope {
        NamespaceScope::All => match gateway.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(error) => {
                warn!("{error:#}");
                app.set_status(format!(
                    "Failed loading namespaces: {}",
                    compact_error(&error)
                ));
                Vec::new()
            }
        },
        NamespaceScope::Named(_) => Vec::new(),
    };
    app.set_namespace_options(namespaces);

    match gateway.list_rule_endpoints(&scope).await {
        Ok(endpoints) => app.set_rule_endpoints(endpoints),
        Err(error) => {
            warn!("{error:#}");
            app.set_rule_endpoints(Vec::new());
        }
    }
}

fn log_transport_failure(what: &str, outcome: &MutationOutcome) {
    if let MutationOutcome::Failed(detail) = outcome {
        warn!("{what} failed: {detail}");
    }
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("\n")
}
