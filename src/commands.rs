use crate::types::SlashCommand;

/// Every slash command the bot answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Help,
    KbStatus,
    SyncDataSource,
    ListDataSources,
    DsConfig,
    GetDataSource,
    AgentStatus,
    JobStatus,
    HealthCheck,
}

pub struct CommandSpec {
    pub name: &'static str,
    pub kind: CommandKind,
    pub usage: &'static str,
    pub summary: &'static str,
}

pub const REGISTRY: &[CommandSpec] = &[
    CommandSpec {
        name: "/ragbot-help",
        kind: CommandKind::Help,
        usage: "/ragbot-help",
        summary: "Show this help message",
    },
    CommandSpec {
        name: "/ragbot-kb-status",
        kind: CommandKind::KbStatus,
        usage: "/ragbot-kb-status",
        summary: "Check the status of the knowledge base",
    },
    CommandSpec {
        name: "/ragbot-sync-datasource",
        kind: CommandKind::SyncDataSource,
        usage: "/ragbot-sync-datasource",
        summary: "Trigger a sync of the knowledge base",
    },
    CommandSpec {
        name: "/ragbot-list-datasources",
        kind: CommandKind::ListDataSources,
        usage: "/ragbot-list-datasources",
        summary: "List all available data sources",
    },
    CommandSpec {
        name: "/ragbot-ds-config",
        kind: CommandKind::DsConfig,
        usage: "/ragbot-ds-config",
        summary: "Get configuration for the data source",
    },
    CommandSpec {
        name: "/ragbot-get-datasource",
        kind: CommandKind::GetDataSource,
        usage: "/ragbot-get-datasource",
        summary: "Get information about the current data source",
    },
    CommandSpec {
        name: "/ragbot-agent-status",
        kind: CommandKind::AgentStatus,
        usage: "/ragbot-agent-status",
        summary: "Check the status of the agent",
    },
    CommandSpec {
        name: "/ragbot-job-status",
        kind: CommandKind::JobStatus,
        usage: "/ragbot-job-status <job_id>",
        summary: "Check the status of an ingestion job",
    },
    CommandSpec {
        name: "/ragbot-health-check",
        kind: CommandKind::HealthCheck,
        usage: "/ragbot-health-check",
        summary: "Check overall health of the Bedrock agent service",
    },
];

impl CommandKind {
    /// Exact, case-sensitive lookup.
    pub fn lookup(name: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.kind)
    }

    pub fn name(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|spec| spec.kind == self)
            .map(|spec| spec.name)
            .unwrap_or("unknown")
    }
}

pub fn help_text() -> String {
    let mut text = String::from("Available commands:");
    for spec in REGISTRY {
        text.push_str(&format!("\n    {} - {}", spec.usage, spec.summary));
    }
    text
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Known(CommandKind, SlashCommand),
    Unknown(SlashCommand),
}

/// Decodes a form body into a command. `None` when the body carries no
/// `command` field at all.
pub fn parse_form(body: &[u8]) -> Result<Option<ParsedCommand>, serde_urlencoded::de::Error> {
    let command: SlashCommand = serde_urlencoded::from_bytes(body)?;
    if command.command.is_empty() {
        return Ok(None);
    }
    Ok(Some(match CommandKind::lookup(&command.command) {
        Some(kind) => ParsedCommand::Known(kind, command),
        None => ParsedCommand::Unknown(command),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        assert_eq!(CommandKind::lookup("/ragbot-help"), Some(CommandKind::Help));
        assert_eq!(
            CommandKind::lookup("/ragbot-job-status"),
            Some(CommandKind::JobStatus)
        );
        assert_eq!(CommandKind::lookup("/RAGBOT-HELP"), None);
        assert_eq!(CommandKind::lookup("/ragbot-help "), None);
        assert_eq!(CommandKind::lookup("/nonexistent"), None);
    }

    #[test]
    fn every_kind_has_one_name() {
        for spec in REGISTRY {
            assert_eq!(CommandKind::lookup(spec.name), Some(spec.kind));
            assert_eq!(spec.kind.name(), spec.name);
            assert!(spec.name.starts_with("/ragbot-"));
        }
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        assert!(help.starts_with("Available commands:"));
        for spec in REGISTRY {
            assert!(help.contains(spec.usage), "missing {}", spec.name);
        }
        assert!(help.contains("/ragbot-job-status <job_id> - Check the status of an ingestion job"));
    }

    #[test]
    fn parses_known_unknown_and_missing_commands() {
        let parsed = parse_form(b"command=%2Fragbot-job-status&text=JOB42&response_url=https%3A%2F%2Fhooks.example%2Fx&user_id=U1&channel_id=C1")
            .unwrap()
            .unwrap();
        let ParsedCommand::Known(kind, cmd) = parsed else {
            panic!("expected known command");
        };
        assert_eq!(kind, CommandKind::JobStatus);
        assert_eq!(cmd.text, "JOB42");
        assert_eq!(cmd.response_url, "https://hooks.example/x");

        assert!(matches!(
            parse_form(b"command=/nonexistent&text=").unwrap(),
            Some(ParsedCommand::Unknown(cmd)) if cmd.command == "/nonexistent"
        ));
        assert_eq!(parse_form(b"text=hello").unwrap(), None);
    }
}
