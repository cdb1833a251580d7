use funnel_core::config::AppConfig;
use funnel_db::{connect_with_settings, ping};
use serde::Serialize;

use crate::commands::support::{load_config, runtime};
use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Readiness report; exits 1 when any check fails or was skipped.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let checks = match load_config() {
        Ok(config) => vec![
            DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ),
            check_crm_token(&config),
            check_database_connectivity(&config),
        ],
        Err(failure) => {
            let skipped = "skipped because configuration did not load";
            vec![
                DoctorCheck::new("config_validation", CheckStatus::Fail, failure.message),
                DoctorCheck::new("crm_token_readiness", CheckStatus::Skipped, skipped),
                DoctorCheck::new("database_connectivity", CheckStatus::Skipped, skipped),
            ]
        }
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_crm_token(config: &AppConfig) -> DoctorCheck {
    match &config.crm.api_token {
        Some(_) => DoctorCheck::new(
            "crm_token_readiness",
            CheckStatus::Pass,
            format!("api token configured for `{}`", config.crm.resolved_base_url()),
        ),
        None => DoctorCheck::new(
            "crm_token_readiness",
            CheckStatus::Fail,
            "no CRM api token; set FUNNEL_CRM_API_TOKEN or crm.api_token",
        ),
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(failure) => {
            return DoctorCheck::new("database_connectivity", CheckStatus::Fail, failure.message);
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let checked = ping(&pool).await.map_err(|error| format!("database ping failed: {error}"));
        pool.close().await;
        checked
    });

    match result {
        Ok(()) => DoctorCheck::new(
            "database_connectivity",
            CheckStatus::Pass,
            format!("connected using `{}`", config.database.url),
        ),
        Err(error) => DoctorCheck::new("database_connectivity", CheckStatus::Fail, error),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
