use anyhow::bail;
use tracing::info;

use crate::records::{self, SourceData};
use crate::tools::kpi::{self, TechnicianKpis};
use crate::week::WeekWindow;

/// How many validation messages are surfaced to the user.
const MAX_REPORTED_ERRORS: usize = 3;

/// One immutable snapshot of a reporting session: the decoded sources, the
/// selected week, and the report computed from them. [`reduce`] yields the
/// next snapshot; nothing is ever updated in place, so a previous snapshot
/// stays fully usable while a new one is being built.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub sources: Option<SourceData>,
    pub week: Option<WeekWindow>,
    pub report: Vec<TechnicianKpis>,
}

#[derive(Debug)]
pub enum SessionAction {
    /// Replace the decoded sources (after all four decodes have finished)
    /// and recompute the report in full.
    LoadSources(SourceData),
    /// Change the selected week and recompute from the already-decoded
    /// sources. No re-decoding happens here.
    SelectWeek(WeekWindow),
}

/// Pure reducer over session snapshots. The report in the returned snapshot
/// is always recomputed from scratch; it is a function of (sources, week)
/// alone, never of the previous report.
pub fn reduce(state: &SessionState, action: SessionAction) -> anyhow::Result<SessionState> {
    let next = match action {
        SessionAction::LoadSources(sources) => {
            validate_job_ids(&sources)?;
            let report = match &state.week {
                Some(week) => run_pipeline(&sources, week),
                None => Vec::new(),
            };
            SessionState { sources: Some(sources), week: state.week, report }
        }
        SessionAction::SelectWeek(week) => {
            let report = match &state.sources {
                Some(sources) => run_pipeline(sources, &week),
                None => Vec::new(),
            };
            SessionState { sources: state.sources.clone(), week: Some(week), report }
        }
    };
    Ok(next)
}

/// filter -> group -> compute, over immutable inputs.
pub fn run_pipeline(sources: &SourceData, week: &WeekWindow) -> Vec<TechnicianKpis> {
    let filtered = records::filter_by_week(sources, week);
    info!(
        "week {}: {} opportunities, {} line items, {} job times, {} appointments in window",
        week,
        filtered.opportunities.len(),
        filtered.line_items.len(),
        filtered.job_times.len(),
        filtered.appointments.len(),
    );
    kpi::build_report(&filtered)
}

/// Structural check run once per pipeline invocation, before grouping: every
/// record in every collection must carry a job id. Violations are collected
/// rather than failing fast, and the first few are surfaced as one error.
pub fn validate_job_ids(sources: &SourceData) -> anyhow::Result<()> {
    let mut errors = Vec::new();
    for (at, opp) in sources.opportunities.iter().enumerate() {
        if opp.job_id.is_empty() {
            errors.push(format!("Opportunity {}: Missing Job ID", at + 1));
        }
    }
    for (at, item) in sources.line_items.iter().enumerate() {
        if item.job_id.is_empty() {
            errors.push(format!("Line Item {}: Missing Job ID", at + 1));
        }
    }
    for (at, job) in sources.job_times.iter().enumerate() {
        if job.job_id.is_empty() {
            errors.push(format!("Job Time {}: Missing Job ID", at + 1));
        }
    }
    for (at, appt) in sources.appointments.iter().enumerate() {
        if appt.job_id.is_empty() {
            errors.push(format!("Appointment {}: Missing Job ID", at + 1));
        }
    }

    if !errors.is_empty() {
        let shown = errors.iter().take(MAX_REPORTED_ERRORS).cloned().collect::<Vec<_>>();
        bail!(
            "data validation errors ({} total): {}",
            errors.len(),
            shown.join(", "),
        );
    }
    Ok(())
}
