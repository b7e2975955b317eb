use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use csv as csv_crate;
use serde::Serialize;

use crate::records::{Appointment, JobTime, LineItem, Opportunity, OpportunityStatus, SourceData};
use crate::utils;

/// Canonical technician identity: trimmed, lowercased. Two raw names map to
/// the same identity iff their trimmed-lowercased forms are equal; there is
/// no fuzzy matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TechId(String);

impl TechId {
    /// Resolves a raw owner/technician name. Empty or whitespace-only input
    /// means "no technician" and yields `None`; callers skip such records
    /// instead of grouping them under an empty identity.
    pub fn resolve(raw: &str) -> Option<Self> {
        let canonical = raw.trim().to_lowercase();
        if canonical.is_empty() {
            None
        } else {
            Some(Self(canonical))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One technician's slice of the week-filtered collections. Built fresh on
/// every computation pass and owned by it; never persisted.
#[derive(Debug, Clone)]
pub struct TechnicianBundle {
    pub id: TechId,
    /// The first raw spelling seen for this identity, in source-processing
    /// order. Later spellings never overwrite it.
    pub display_name: String,
    pub opportunities: Vec<Opportunity>,
    pub line_items: Vec<LineItem>,
    pub job_times: Vec<JobTime>,
    pub appointments: Vec<Appointment>,
}

impl TechnicianBundle {
    fn new(id: TechId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            opportunities: Vec::new(),
            line_items: Vec::new(),
            job_times: Vec::new(),
            appointments: Vec::new(),
        }
    }
}

/// Partitions the four collections by resolved technician identity. The
/// sources are processed in the fixed order opportunities, line items, job
/// times, appointments; output order is insertion order of first appearance.
pub fn group_by_technician(data: &SourceData) -> Vec<TechnicianBundle> {
    let mut bundles: Vec<TechnicianBundle> = Vec::new();
    let mut index: HashMap<TechId, usize> = HashMap::new();

    fn bundle_at<'a>(
        bundles: &'a mut Vec<TechnicianBundle>,
        index: &mut HashMap<TechId, usize>,
        raw_name: &str,
    ) -> Option<&'a mut TechnicianBundle> {
        let id = TechId::resolve(raw_name)?;
        let at = *index.entry(id.clone()).or_insert_with(|| {
            bundles.push(TechnicianBundle::new(id, raw_name.to_owned()));
            bundles.len() - 1
        });
        Some(&mut bundles[at])
    }

    for opp in &data.opportunities {
        if let Some(bundle) = bundle_at(&mut bundles, &mut index, &opp.owner) {
            bundle.opportunities.push(opp.clone());
        }
    }
    for item in &data.line_items {
        if let Some(bundle) = bundle_at(&mut bundles, &mut index, &item.owner) {
            bundle.line_items.push(item.clone());
        }
    }
    for job in &data.job_times {
        if let Some(bundle) = bundle_at(&mut bundles, &mut index, &job.owner) {
            bundle.job_times.push(job.clone());
        }
    }
    for appt in &data.appointments {
        if let Some(bundle) = bundle_at(&mut bundles, &mut index, &appt.technician) {
            bundle.appointments.push(appt.clone());
        }
    }

    bundles
}

/// The unique raw technician names across all four collections, sorted.
pub fn unique_technicians(data: &SourceData) -> Vec<String> {
    let mut names = BTreeSet::new();
    for opp in &data.opportunities {
        if !opp.owner.is_empty() {
            names.insert(opp.owner.clone());
        }
    }
    for item in &data.line_items {
        if !item.owner.is_empty() {
            names.insert(item.owner.clone());
        }
    }
    for job in &data.job_times {
        if !job.owner.is_empty() {
            names.insert(job.owner.clone());
        }
    }
    for appt in &data.appointments {
        if !appt.technician.is_empty() {
            names.insert(appt.technician.clone());
        }
    }
    names.into_iter().collect()
}

/// The eight weekly indicators for one technician.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiMetrics {
    pub average_ticket_value: f64,
    pub job_close_rate: f64,
    pub weekly_revenue: f64,
    pub job_efficiency: f64,
    pub membership_win_rate: f64,
    pub hydro_jetting_jobs: usize,
    pub descaling_jobs: usize,
    pub water_heater_jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicianKpis {
    pub technician: String,
    pub metrics: KpiMetrics,
}

/// Groups the (already week-filtered) collections and computes metrics for
/// every technician, in first-appearance order.
pub fn build_report(data: &SourceData) -> Vec<TechnicianKpis> {
    group_by_technician(data)
        .into_iter()
        .map(|bundle| TechnicianKpis {
            technician: bundle.display_name.clone(),
            metrics: compute_metrics(&bundle),
        })
        .collect()
}

pub fn compute_metrics(bundle: &TechnicianBundle) -> KpiMetrics {
    KpiMetrics {
        average_ticket_value: average_ticket_value(bundle),
        job_close_rate: job_close_rate(bundle),
        weekly_revenue: weekly_revenue(bundle),
        job_efficiency: job_efficiency(bundle),
        membership_win_rate: membership_win_rate(bundle),
        hydro_jetting_jobs: count_line_items(bundle, HYDRO_JETTING_KEYWORDS),
        descaling_jobs: count_line_items(bundle, DESCALING_KEYWORDS),
        water_heater_jobs: count_line_items(bundle, WATER_HEATER_KEYWORDS),
    }
}

/// Mean revenue of won opportunities. 0 when none were won, even if other
/// non-won opportunities carry revenue.
fn average_ticket_value(bundle: &TechnicianBundle) -> f64 {
    let won: Vec<_> = bundle
        .opportunities
        .iter()
        .filter(|opp| opp.status == OpportunityStatus::Won)
        .collect();
    if won.is_empty() {
        return 0.0;
    }
    won.iter().map(|opp| opp.revenue).sum::<f64>() / won.len() as f64
}

/// Won opportunities over all opportunities, as a percentage. 0 when the
/// technician has no opportunities.
fn job_close_rate(bundle: &TechnicianBundle) -> f64 {
    let total = bundle.opportunities.len();
    if total == 0 {
        return 0.0;
    }
    let won =
        bundle.opportunities.iter().filter(|opp| opp.status == OpportunityStatus::Won).count();
    won as f64 / total as f64 * 100.0
}

/// Opportunity revenue plus appointment revenue. A job present in both
/// exports is summed twice; historical reports have always added the two
/// exports independently, so this must not deduplicate by job id.
fn weekly_revenue(bundle: &TechnicianBundle) -> f64 {
    let opportunities: f64 = bundle.opportunities.iter().map(|opp| opp.revenue).sum();
    let appointments: f64 = bundle.appointments.iter().map(|appt| appt.revenue).sum();
    opportunities + appointments
}

/// Mean of the per-job efficiency percentages, excluding entries that parse
/// to exactly 0 or fail to parse. 0 when nothing valid remains.
fn job_efficiency(bundle: &TechnicianBundle) -> f64 {
    let valid: Vec<f64> = bundle
        .job_times
        .iter()
        .map(|job| utils::parse_percentage(&job.efficiency))
        .filter(|eff| *eff > 0.0)
        .collect();
    if valid.is_empty() {
        return 0.0;
    }
    valid.iter().sum::<f64>() / valid.len() as f64
}

/// Memberships sold over memberships offered, as a percentage. 0 when no
/// opportunity had a membership offered.
fn membership_win_rate(bundle: &TechnicianBundle) -> f64 {
    let offered: Vec<_> =
        bundle.opportunities.iter().filter(|opp| opp.membership_offered).collect();
    if offered.is_empty() {
        return 0.0;
    }
    let sold = offered.iter().filter(|opp| opp.membership_sold).count();
    sold as f64 / offered.len() as f64 * 100.0
}

const HYDRO_JETTING_KEYWORDS: &[&str] = &["hydro", "jetting", "high pressure"];
const DESCALING_KEYWORDS: &[&str] = &["descal", "scale removal", "cast iron pipe descaling"];
const WATER_HEATER_KEYWORDS: &[&str] = &["water heater", "hot water", "heater install"];

/// Case-insensitive substring match of a line-item description against a
/// keyword set. The three category sets are not mutually exclusive; one line
/// item may count toward several.
fn matches_category(description: &str, keywords: &[&str]) -> bool {
    let description = description.to_lowercase();
    keywords.iter().any(|keyword| description.contains(keyword))
}

fn count_line_items(bundle: &TechnicianBundle, keywords: &[&str]) -> usize {
    bundle.line_items.iter().filter(|item| matches_category(&item.description, keywords)).count()
}

/// Qualitative band for a metric value, for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Good,
    Warning,
    Poor,
}

impl Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Band::Good => "good",
            Band::Warning => "warning",
            Band::Poor => "poor",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub good: f64,
    pub warning: f64,
}

/// Band boundaries are inclusive on the lower edge of each tier.
pub fn classify(value: f64, thresholds: Thresholds) -> Band {
    if value >= thresholds.good {
        Band::Good
    } else if value >= thresholds.warning {
        Band::Warning
    } else {
        Band::Poor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFormat {
    Currency,
    Percent,
    Count,
}

/// Static identifier for each of the eight metrics, carrying its label,
/// display format, and fixed thresholds. Presentation code indexes metrics
/// through this enum rather than by matching on display labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    AverageTicketValue,
    JobCloseRate,
    WeeklyRevenue,
    JobEfficiency,
    MembershipWinRate,
    HydroJettingJobs,
    DescalingJobs,
    WaterHeaterJobs,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::AverageTicketValue,
        Metric::JobCloseRate,
        Metric::WeeklyRevenue,
        Metric::JobEfficiency,
        Metric::MembershipWinRate,
        Metric::HydroJettingJobs,
        Metric::DescalingJobs,
        Metric::WaterHeaterJobs,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::AverageTicketValue => "Average Ticket Value",
            Metric::JobCloseRate => "Job Close Rate",
            Metric::WeeklyRevenue => "Weekly Revenue",
            Metric::JobEfficiency => "Job Efficiency",
            Metric::MembershipWinRate => "Membership Win Rate",
            Metric::HydroJettingJobs => "Hydro Jetting Jobs",
            Metric::DescalingJobs => "Descaling Jobs",
            Metric::WaterHeaterJobs => "Water Heater Jobs",
        }
    }

    /// The camel-case key used in the JSON report.
    pub fn key(self) -> &'static str {
        match self {
            Metric::AverageTicketValue => "averageTicketValue",
            Metric::JobCloseRate => "jobCloseRate",
            Metric::WeeklyRevenue => "weeklyRevenue",
            Metric::JobEfficiency => "jobEfficiency",
            Metric::MembershipWinRate => "membershipWinRate",
            Metric::HydroJettingJobs => "hydroJettingJobs",
            Metric::DescalingJobs => "descalingJobs",
            Metric::WaterHeaterJobs => "waterHeaterJobs",
        }
    }

    pub fn format(self) -> MetricFormat {
        match self {
            Metric::AverageTicketValue | Metric::WeeklyRevenue => MetricFormat::Currency,
            Metric::JobCloseRate | Metric::JobEfficiency | Metric::MembershipWinRate => {
                MetricFormat::Percent
            }
            Metric::HydroJettingJobs | Metric::DescalingJobs | Metric::WaterHeaterJobs => {
                MetricFormat::Count
            }
        }
    }

    pub fn thresholds(self) -> Thresholds {
        match self {
            Metric::AverageTicketValue => Thresholds { good: 1000.0, warning: 500.0 },
            Metric::JobCloseRate => Thresholds { good: 80.0, warning: 60.0 },
            Metric::WeeklyRevenue => Thresholds { good: 10000.0, warning: 5000.0 },
            Metric::JobEfficiency => Thresholds { good: 75.0, warning: 50.0 },
            Metric::MembershipWinRate => Thresholds { good: 50.0, warning: 25.0 },
            Metric::HydroJettingJobs => Thresholds { good: 5.0, warning: 2.0 },
            Metric::DescalingJobs => Thresholds { good: 3.0, warning: 1.0 },
            Metric::WaterHeaterJobs => Thresholds { good: 2.0, warning: 1.0 },
        }
    }

    pub fn value(self, metrics: &KpiMetrics) -> f64 {
        match self {
            Metric::AverageTicketValue => metrics.average_ticket_value,
            Metric::JobCloseRate => metrics.job_close_rate,
            Metric::WeeklyRevenue => metrics.weekly_revenue,
            Metric::JobEfficiency => metrics.job_efficiency,
            Metric::MembershipWinRate => metrics.membership_win_rate,
            Metric::HydroJettingJobs => metrics.hydro_jetting_jobs as f64,
            Metric::DescalingJobs => metrics.descaling_jobs as f64,
            Metric::WaterHeaterJobs => metrics.water_heater_jobs as f64,
        }
    }

    pub fn band(self, metrics: &KpiMetrics) -> Band {
        classify(self.value(metrics), self.thresholds())
    }

    pub fn format_value(self, metrics: &KpiMetrics) -> String {
        let value = self.value(metrics);
        match self.format() {
            MetricFormat::Currency => format!("${value:.2}"),
            MetricFormat::Percent => format!("{value:.1}%"),
            MetricFormat::Count => format!("{}", value as i64),
        }
    }
}

pub mod output {
    use std::io::Write;

    use crate::week::WeekWindow;

    use super::{csv_crate, Metric, TechnicianKpis};

    pub mod human {
        use super::*;

        pub fn print_report<W>(
            report: &[TechnicianKpis],
            window: &WeekWindow,
            out: &mut W,
        ) -> std::io::Result<()>
        where
            W: Write,
        {
            writeln!(out, "Technician KPIs for week {}: ================", window)?;
            writeln!(out, "Technicians: {}", report.len())?;
            for TechnicianKpis { technician, metrics } in report {
                writeln!(out)?;
                writeln!(out, "{}: ----------------", technician)?;
                for metric in Metric::ALL {
                    writeln!(
                        out,
                        "{:22} {:>12}  [{}]",
                        metric.label(),
                        metric.format_value(metrics),
                        metric.band(metrics),
                    )?;
                }
            }
            Ok(())
        }
    }

    pub mod csv {
        use super::*;

        pub fn print_report<W>(
            report: &[TechnicianKpis],
            _window: &WeekWindow,
            out: &mut W,
        ) -> std::io::Result<()>
        where
            W: Write,
        {
            let mut writer = csv_crate::Writer::from_writer(out);
            let mut header = vec!["Technician"];
            header.extend(Metric::ALL.iter().map(|metric| metric.label()));
            writer.write_record(&header)?;
            for TechnicianKpis { technician, metrics } in report {
                let mut record = vec![technician.clone()];
                record.extend(Metric::ALL.iter().map(|metric| metric.value(metrics).to_string()));
                writer.write_record(&record)?;
            }
            writer.flush()?;
            Ok(())
        }
    }

    pub mod json {
        use super::*;

        pub fn print_report<W>(
            report: &[TechnicianKpis],
            window: &WeekWindow,
            out: &mut W,
        ) -> anyhow::Result<()>
        where
            W: Write,
        {
            let technicians: Vec<serde_json::Value> = report
                .iter()
                .map(|entry| {
                    let bands: serde_json::Map<String, serde_json::Value> = Metric::ALL
                        .iter()
                        .map(|metric| {
                            (
                                metric.key().to_owned(),
                                serde_json::Value::String(metric.band(&entry.metrics).to_string()),
                            )
                        })
                        .collect();
                    serde_json::json!({
                        "technician": entry.technician,
                        "metrics": entry.metrics,
                        "bands": bands,
                    })
                })
                .collect();
            let document = serde_json::json!({
                "week": window.to_string(),
                "technicians": technicians,
            });
            serde_json::to_writer_pretty(&mut *out, &document)?;
            writeln!(out)?;
            Ok(())
        }
    }
}
