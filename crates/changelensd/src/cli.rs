use std::path::PathBuf;

use changelens_config::AnalysisProviderKind;
use changelens_core::{ProjectId, TicketId};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct NotificationsArgs {
    #[arg(long, help = "Bypass the cache and refetch the latest notifications")]
    pub refresh: bool,

    #[arg(long, help = "Mark the given ticket's notifications as read before printing")]
    pub mark_read: Option<TicketId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct VersionsArgs {
    #[arg(help = "Ticket id")]
    pub ticket_id: TicketId,

    #[arg(long, help = "Bypass the cache and refetch the history")]
    pub refresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ViewArgs {
    #[arg(help = "Ticket id of the notification to open")]
    pub ticket_id: TicketId,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AnalyzeArgs {
    #[arg(long = "old", help = "Previous description text")]
    pub old_description: String,

    #[arg(long = "new", help = "Current description text")]
    pub new_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AskArgs {
    #[arg(help = "Question for the project assistant")]
    pub query: String,

    #[arg(long, help = "Project the question is scoped to")]
    pub project: String,

    #[arg(long, default_value_t = 3, help = "Number of context passages to retrieve")]
    pub num_results: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ProjectArgs {
    #[arg(help = "Project id")]
    pub project_id: ProjectId,

    #[arg(long, help = "Also list the project's tickets")]
    pub tickets: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// List the latest change notifications
    Notifications(NotificationsArgs),
    /// Print a ticket's version history, most recent first
    Versions(VersionsArgs),
    /// Build the change view (versions, diff, analysis) for a ticket
    View(ViewArgs),
    /// Analyze a description change directly
    Analyze(AnalyzeArgs),
    /// Ask the project assistant a question
    Ask(AskArgs),
    /// Show a project and optionally its tickets
    Project(ProjectArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Ticket change review daemon")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .changelens/config.toml"
    )]
    pub workspace: PathBuf,

    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[arg(long, global = true, help = "Ticket backend base URL override")]
    pub backend_url: Option<String>,

    #[arg(long, global = true, value_parser = parse_analysis_provider)]
    pub analysis_provider: Option<AnalysisProviderKind>,

    #[arg(long, global = true, help = "Analysis service base URL override")]
    pub analysis_endpoint: Option<String>,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_analysis_provider(value: &str) -> Result<AnalysisProviderKind, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parses_view_with_global_overrides() {
        let cli = Cli::try_parse_from([
            "changelensd",
            "view",
            "42",
            "--analysis-provider",
            "heuristic",
            "--log-format",
            "json",
        ])
        .expect("parse cli");

        assert_eq!(cli.command, Commands::View(ViewArgs { ticket_id: 42 }));
        assert_eq!(cli.analysis_provider, Some(AnalysisProviderKind::Heuristic));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_unknown_log_format() {
        let result = Cli::try_parse_from(["changelensd", "--log-format", "xml", "notifications"]);
        assert!(result.is_err());
    }

    #[test]
    fn analyze_takes_old_and_new_text() {
        let cli = Cli::try_parse_from(["changelensd", "analyze", "--old", "A", "--new", "B"])
            .expect("parse cli");

        assert_eq!(
            cli.command,
            Commands::Analyze(AnalyzeArgs {
                old_description: "A".to_owned(),
                new_description: "B".to_owned(),
            })
        );
    }
}
