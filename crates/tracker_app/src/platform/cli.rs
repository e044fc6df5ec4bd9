use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracker_core::{MigrationId, MigrationStatus, View};

use super::config::Overrides;
use super::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "migration-watch", version, about = "Track and control photo migrations")]
pub struct Cli {
    /// RON configuration file; missing file means defaults.
    #[arg(long, value_name = "FILE", default_value = "migration-watch.ron")]
    pub config: PathBuf,

    /// Base URL of the migration API.
    #[arg(long, env = "MIGRATION_API_URL")]
    pub api_url: Option<String>,

    /// Websocket endpoint for push updates.
    #[arg(long, env = "MIGRATION_WS_URL")]
    pub ws_url: Option<String>,

    /// Bearer token for the migration API.
    #[arg(long, env = "MIGRATION_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    pub log: LogTarget,

    #[command(subcommand)]
    pub screen: Option<ScreenCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum ScreenCommand {
    /// Linked accounts, the active migration and the migration list.
    Dashboard {
        /// URL the authorization provider redirected back to.
        #[arg(long, value_name = "URL")]
        redirect: Option<String>,
    },
    /// Past and current migrations, read from the service with the filter.
    History {
        #[arg(long)]
        status: Option<MigrationStatus>,
    },
    /// Live progress and controls for one migration.
    Watch { id: MigrationId },
    /// Connected accounts.
    Settings {
        #[arg(long, value_name = "URL")]
        redirect: Option<String>,
    },
}

/// What the session shows and which location it was opened from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub view: View,
    pub redirect: Option<String>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            api_base_url: self.api_url.clone(),
            ws_url: self.ws_url.clone(),
            api_token: self.token.clone(),
        }
    }

    pub fn screen(&self) -> Screen {
        let dashboard = Screen {
            view: View::Dashboard,
            redirect: None,
        };
        match self.screen.clone() {
            None => dashboard,
            Some(ScreenCommand::Dashboard { redirect }) => Screen {
                redirect,
                ..dashboard
            },
            Some(ScreenCommand::History { status }) => Screen {
                view: View::History { filter: status },
                redirect: None,
            },
            Some(ScreenCommand::Watch { id }) => Screen {
                view: View::Detail(id),
                redirect: None,
            },
            Some(ScreenCommand::Settings { redirect }) => Screen {
                view: View::Settings,
                redirect,
            },
        }
    }
}
