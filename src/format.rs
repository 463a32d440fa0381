use serde_json::Value;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::agent::{
    AgentStatus, DataSourceConfig, DataSourceSummary, HealthReport, IngestionJob,
    IngestionJobSummary, IngestionStatistics, KnowledgeBaseStatus, MonitorOutcome,
};

pub fn format_date(date: Option<OffsetDateTime>) -> String {
    let Some(date) = date else {
        return "No date provided".to_string();
    };
    let fmt = format_description!(
        "[month repr:long] [day padding:none], [year] [hour repr:12 padding:none]:[minute] [period]"
    );
    date.to_offset(time::UtcOffset::UTC)
        .format(&fmt)
        .unwrap_or_else(|_| date.to_string())
}

pub fn knowledge_base_status(kb: &KnowledgeBaseStatus) -> String {
    format!(
        "KNOWLEDGE BASE STATUS:\n\nKnowledge Base: {}\nStatus: {}\nCreated At: {}\nUpdated At: {}",
        kb.name,
        kb.status,
        format_date(kb.created_at),
        format_date(kb.updated_at)
    )
}

pub fn data_source_config(ds: &DataSourceConfig) -> String {
    format!(
        "DATA SOURCE CONFIGURATION:\n\nData Source: {}\nStatus: {}\nConfiguration: Type: {}\nCreated At: {}\nUpdated At: {}",
        ds.name,
        ds.status,
        ds.data_source_configuration.kind,
        format_date(ds.created_at),
        format_date(ds.updated_at)
    )
}

pub fn agent_status(agent: &AgentStatus) -> String {
    format!(
        "AGENT INFORMATION:\n\nAgent Name: {}\nAgent ID: {}\nStatus: {}\nFoundation Model: {}\nCreated At: {}\nUpdated At: {}",
        agent.agent_name,
        agent.agent_id,
        agent.agent_status,
        agent.foundation_model.as_deref().unwrap_or(""),
        format_date(agent.created_at),
        format_date(agent.updated_at)
    )
}

pub fn data_source_list(sources: &[DataSourceSummary]) -> String {
    let entries: Vec<String> = sources
        .iter()
        .map(|s| {
            format!(
                "Data Source: {}\n Name: {}\n Status: {}\n Updated At: {}\n",
                s.data_source_id,
                s.name,
                s.status,
                format_date(s.updated_at)
            )
        })
        .collect();
    if entries.is_empty() {
        return "AVAILABLE DATA SOURCES:\n\nNo data sources found.".to_string();
    }
    format!("AVAILABLE DATA SOURCES:\n\n{}", entries.join("\n"))
}

pub fn sync_started(job: &IngestionJob) -> String {
    format!(
        "DATA SOURCE SYNC INITIATED:\n\nData Source: {}\nKnowledge Base: {}\nJob ID: {}\nStatus: {}",
        job.data_source_id, job.knowledge_base_id, job.ingestion_job_id, job.status
    )
}

pub fn latest_ingestion(summary: Option<&IngestionJobSummary>) -> String {
    let body = match summary {
        None => "No data sources found for this knowledge base.".to_string(),
        Some(job) => format!(
            "Data Source: {}\nKnowledge Base: {}\nMessage: {}\nStatus: {}\nLast sync: {}",
            job.data_source_id,
            job.knowledge_base_id,
            job.description.as_deref().unwrap_or(""),
            job.status,
            format_date(job.updated_at)
        ),
    };
    format!("DATA SOURCE INFORMATION:\n\n{}", body)
}

pub fn job_status(job: &IngestionJob) -> String {
    let failures = if job.failure_reasons.is_empty() {
        "None".to_string()
    } else {
        job.failure_reasons.join("\n")
    };
    format!(
        "INGESTION JOB STATUS:\n\nIngestion Job: {}\nStatus: {}\nStarted At: {}\nUpdated At: {}\nStatistics: {}\nFailure Reasons: {}",
        job.ingestion_job_id,
        job.status,
        format_date(job.started_at),
        format_date(job.updated_at),
        job.statistics
            .as_ref()
            .map(statistics)
            .unwrap_or_else(|| "None".to_string()),
        failures
    )
}

fn statistics(stats: &IngestionStatistics) -> String {
    format!(
        "{} scanned, {} new, {} modified, {} deleted, {} failed",
        stats.number_of_documents_scanned,
        stats.number_of_new_documents_indexed,
        stats.number_of_modified_documents_indexed,
        stats.number_of_documents_deleted,
        stats.number_of_documents_failed
    )
}

pub fn monitor_outcome(outcome: &MonitorOutcome) -> String {
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" };
    format!(
        "{} DATA SOURCE SYNC FINISHED:\n\nJob ID: {}\nStatus: {}\nKnowledge Base Updated: {}\nAgent Ready: {}\n\n{}",
        if outcome.success { "✅" } else { "⚠️" },
        outcome.job_id,
        outcome.job_status,
        yes_no(outcome.knowledge_base_updated),
        yes_no(outcome.agent_ready),
        outcome.message
    )
}

pub fn health(report: &HealthReport) -> String {
    if report.healthy {
        return format!(
            "✅ Ragbot is healthy and ready to use.\n\nAgent: {}\nRegion: {}",
            report.details.agent_name.as_deref().unwrap_or("unknown"),
            report.details.region
        );
    }
    let issues: Vec<String> = report
        .issues
        .iter()
        .map(|i| format!("• {}: {}", i.component, i.message))
        .collect();
    format!("❌ Ragbot has issues:\n\n{}", issues.join("\n"))
}

/// Renders an agent trace as a fenced block, one line per step.
pub fn traceback(trace: Option<&Value>) -> String {
    let Some(trace) = trace else {
        return "No traceback information available".to_string();
    };

    let mut out = String::from("```\n🤖 Agent Traceback\n================\n");
    let steps = trace
        .get("steps")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_else(|| vec![trace.clone()]);

    if steps.is_empty() {
        out.push_str("(no steps recorded)\n");
    }
    for (i, step) in steps.iter().enumerate() {
        let line = match step {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("{}. {}\n", i + 1, line));
    }
    out.push_str("```");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{HealthDetails, HealthIssue};
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn formats_dates_in_long_form() {
        assert_eq!(
            format_date(Some(datetime!(2006-01-02 15:04 UTC))),
            "January 2, 2006 3:04 PM"
        );
        assert_eq!(
            format_date(Some(datetime!(2024-11-20 09:05 +2))),
            "November 20, 2024 7:05 AM"
        );
        assert_eq!(format_date(None), "No date provided");
    }

    #[test]
    fn health_lists_issues() {
        let report = HealthReport {
            healthy: false,
            issues: vec![HealthIssue {
                component: "Agent".into(),
                status: "CREATING".into(),
                message: "Agent is not in a ready state. Current status: CREATING".into(),
            }],
            details: HealthDetails::default(),
        };
        assert_eq!(
            health(&report),
            "❌ Ragbot has issues:\n\n• Agent: Agent is not in a ready state. Current status: CREATING"
        );
    }

    #[test]
    fn job_status_without_failures_says_none() {
        let job = IngestionJob {
            ingestion_job_id: "J1".into(),
            data_source_id: "DS1".into(),
            knowledge_base_id: "KB1".into(),
            status: "IN_PROGRESS".into(),
            started_at: None,
            updated_at: None,
            statistics: Some(IngestionStatistics {
                number_of_documents_scanned: 3,
                ..IngestionStatistics::default()
            }),
            failure_reasons: Vec::new(),
        };
        let text = job_status(&job);
        assert!(text.starts_with("INGESTION JOB STATUS:\n\nIngestion Job: J1"));
        assert!(text.contains("Statistics: 3 scanned, 0 new"));
        assert!(text.ends_with("Failure Reasons: None"));
    }

    #[test]
    fn latest_ingestion_handles_no_jobs() {
        assert_eq!(
            latest_ingestion(None),
            "DATA SOURCE INFORMATION:\n\nNo data sources found for this knowledge base."
        );
    }

    #[test]
    fn monitor_outcome_summarises_flags() {
        let text = monitor_outcome(&MonitorOutcome {
            success: false,
            job_id: "J1".into(),
            job_status: "COMPLETE".into(),
            knowledge_base_updated: false,
            agent_ready: true,
            message: "Job completed but knowledge base timestamp was not updated".into(),
        });
        assert!(text.starts_with("⚠️ DATA SOURCE SYNC FINISHED:"));
        assert!(text.contains("Knowledge Base Updated: No\nAgent Ready: Yes"));
    }

    #[test]
    fn traceback_numbers_steps() {
        let text = traceback(Some(&json!({"steps": ["plan", {"tool": "kb"}]})));
        assert!(text.starts_with("```\n🤖 Agent Traceback"));
        assert!(text.contains("1. plan\n"));
        assert!(text.contains("2. {\"tool\":\"kb\"}\n"));
        assert_eq!(traceback(None), "No traceback information available");
    }
}
