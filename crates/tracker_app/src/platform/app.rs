use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracker_core::{update, AppState, Command, MigrationId, MigrationStatus, Msg, UrlLocation, View};
use tracker_engine::EngineHandle;
use tracker_logging::{tracker_info, tracker_warn};

use super::cli::{Cli, Screen};
use super::effects::{map_event, EffectRunner};
use super::{config, logging, render};

const RENDER_INTERVAL: Duration = Duration::from_millis(100);

pub async fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log.into());

    let settings = config::resolve_settings(config::load_file_config(&cli.config), cli.overrides());
    tracker_info!(
        "migration-watch starting: api={} ws={}",
        settings.api_base_url,
        settings.ws_url
    );
    let screen = cli.screen();
    let location = screen
        .redirect
        .as_deref()
        .map(UrlLocation::parse)
        .transpose()
        .context("--redirect is not a valid URL")?;
    let engine = EngineHandle::new(settings).context("invalid API settings")?;

    let mut session = Session {
        state: AppState::new(),
        runner: EffectRunner::new(engine, location),
        screen,
    };
    let result = session.run().await;

    // The view is torn down on every exit path, including errors.
    session.dispatch(Msg::ViewExited {
        view: session.screen.view,
    });
    session.runner.shutdown().await;
    result
}

struct Session {
    state: AppState,
    runner: EffectRunner,
    screen: Screen,
}

enum Flow {
    Continue,
    Quit,
}

impl Session {
    async fn run(&mut self) -> anyhow::Result<()> {
        self.dispatch(Msg::ViewEntered {
            view: self.screen.view,
            location_query: self.runner.location_query(),
        });
        self.render();
        print_help();

        let mut input = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = tokio::time::interval(RENDER_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.runner.next_event() => {
                    let Some(event) = event else { return Ok(()) };
                    for msg in map_event(event) {
                        self.dispatch(msg);
                    }
                }
                line = input.next_line() => {
                    let Some(line) = line.context("reading commands from stdin")? else {
                        return Ok(());
                    };
                    if let Flow::Quit = self.handle_input(&line) {
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    self.dispatch(Msg::Tick);
                    self.render();
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("waiting for ctrl-c")?;
                    tracker_info!("interrupted");
                    return Ok(());
                }
            }
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);

        for notification in self.runner.take_notifications() {
            println!("{}", render::notification_line(&notification));
        }
        if let Some(migration_id) = self.runner.take_confirm_prompt() {
            println!("Cancel migration {migration_id}? Progress is discarded. [y/N]");
        }
    }

    fn render(&mut self) {
        if !self.state.consume_dirty() {
            return;
        }
        let view = self.state.view();
        for line in render::render(&self.screen, &view) {
            println!("{line}");
        }
    }

    fn handle_input(&mut self, line: &str) -> Flow {
        let Some(input) = parse_input(line) else {
            tracker_warn!("unrecognised input {:?}", line);
            print_help();
            return Flow::Continue;
        };
        let pending_cancel = self.pending_cancel();

        match input {
            Input::Quit => return Flow::Quit,
            Input::Help => print_help(),
            Input::Refresh(filter) => {
                self.screen.view = refreshed_view(self.screen.view, filter);
                self.dispatch(Msg::ListRequested { filter });
            }
            Input::Create => self.dispatch(Msg::CreateRequested),
            Input::Confirm(yes) => match pending_cancel {
                Some(migration_id) if yes => self.dispatch(Msg::CancelConfirmed { migration_id }),
                Some(migration_id) => self.dispatch(Msg::CancelDismissed { migration_id }),
                None => println!("Nothing to confirm."),
            },
            Input::Command { command, target } => {
                match target.or_else(|| self.default_target()) {
                    Some(migration_id) => self.dispatch(Msg::CommandRequested {
                        migration_id,
                        command,
                    }),
                    None => println!("No migration selected; add an id, e.g. `{} 12`.", command),
                }
            }
        }
        Flow::Continue
    }

    fn default_target(&self) -> Option<MigrationId> {
        match self.screen.view {
            View::Detail(id) => Some(id),
            _ => self.state.view().active_migration,
        }
    }

    fn pending_cancel(&self) -> Option<MigrationId> {
        self.state
            .view()
            .migrations
            .iter()
            .find(|row| row.awaiting_cancel_confirmation)
            .map(|row| row.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Command {
        command: Command,
        target: Option<MigrationId>,
    },
    Confirm(bool),
    Refresh(Option<MigrationStatus>),
    Create,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    let arg = words.next();
    if words.next().is_some() {
        return None;
    }

    let command = |command: Command| -> Option<Input> {
        let target = match arg {
            Some(raw) => Some(raw.parse::<MigrationId>().ok()?),
            None => None,
        };
        Some(Input::Command { command, target })
    };

    match (head.as_str(), arg) {
        ("s" | "start", _) => command(Command::Start),
        ("p" | "pause", _) => command(Command::Pause),
        ("r" | "resume", _) => command(Command::Resume),
        ("c" | "cancel", _) => command(Command::Cancel),
        ("y" | "yes", None) => Some(Input::Confirm(true)),
        ("n" | "no", None) => Some(Input::Confirm(false)),
        ("l" | "list", None) => Some(Input::Refresh(None)),
        ("l" | "list", Some(status)) => status.parse().ok().map(|status| Input::Refresh(Some(status))),
        ("new", None) => Some(Input::Create),
        ("h" | "help" | "?", None) => Some(Input::Help),
        ("q" | "quit", None) => Some(Input::Quit),
        _ => None,
    }
}

/// A history screen shows whatever the last list read asked for.
fn refreshed_view(view: View, filter: Option<MigrationStatus>) -> View {
    match view {
        View::History { .. } => View::History { filter },
        other => other,
    }
}

fn print_help() {
    println!(
        "Commands: new, s|p|r|c [id] start/pause/resume/cancel, y/n confirm, l [status] refresh, q quit"
    );
}
