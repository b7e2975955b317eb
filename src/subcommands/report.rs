use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use drainkpi::records::{self, SourceData};
use drainkpi::session::{self, SessionAction, SessionState};
use drainkpi::sheets::{self, RawRow};
use drainkpi::tools::kpi::output;
use drainkpi::week::WeekWindow;
use tracing::warn;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// The "Opportunities" workbook. A slot left unspecified is treated as
    /// an empty collection.
    #[arg(long)]
    pub opportunities: Option<PathBuf>,

    /// The "Sold Line Items" workbook.
    #[arg(long)]
    pub line_items: Option<PathBuf>,

    /// The "Job Times" workbook.
    #[arg(long)]
    pub job_times: Option<PathBuf>,

    /// The "Appointments" workbook.
    #[arg(long)]
    pub appointments: Option<PathBuf>,

    /// The week to report on: "today" or any "%Y-%m-%d" date. The report
    /// always covers the Monday-Sunday week containing the given date.
    #[arg(long, default_value = "today")]
    week: String,

    /// The format in which to print the report.
    #[arg(long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// The file to write the report to. "-" or unspecified writes to stdout.
    #[arg(short, long, default_value = None)]
    output: Option<PathBuf>,
}

#[derive(Debug, clap::ValueEnum, Clone, Copy, Eq, PartialEq)]
enum OutputFormat {
    /// A human-readable per-technician block, with threshold bands.
    Human,
    /// One CSV row per technician, one column per metric.
    Csv,
    /// A JSON document with metrics and threshold bands per technician.
    Json,
}

pub async fn main(args: Args) -> anyhow::Result<()> {
    let Args { opportunities, line_items, job_times, appointments, week, format, output } = args;

    let week = WeekWindow::from_selector(&week)?;
    let sources = load_sources(opportunities, line_items, job_times, appointments).await?;

    let state = session::reduce(&SessionState::default(), SessionAction::SelectWeek(week))?;
    let state = session::reduce(&state, SessionAction::LoadSources(sources))?;

    let mut out: Box<dyn std::io::Write> = match output {
        Some(path) if path != Path::new("-") => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Box::new(std::io::BufWriter::new(file))
        }
        _ => Box::new(std::io::stdout()),
    };
    match format {
        OutputFormat::Human => output::human::print_report(&state.report, &week, &mut out)?,
        OutputFormat::Csv => output::csv::print_report(&state.report, &week, &mut out)?,
        OutputFormat::Json => output::json::print_report(&state.report, &week, &mut out)?,
    }
    out.flush()?;

    Ok(())
}

/// Decodes the four workbooks. The decodes are independent and I/O bound, so
/// they run concurrently; the collections are only assembled once all four
/// have finished (or were treated as empty).
pub(crate) async fn load_sources(
    opportunities: Option<PathBuf>,
    line_items: Option<PathBuf>,
    job_times: Option<PathBuf>,
    appointments: Option<PathBuf>,
) -> anyhow::Result<SourceData> {
    let opportunities = tokio::task::spawn_blocking(move || {
        decode(
            opportunities,
            "opportunities",
            records::OPPORTUNITIES_SHEET,
            records::opportunities_from_rows,
        )
    });
    let line_items = tokio::task::spawn_blocking(move || {
        decode(line_items, "line items", records::LINE_ITEMS_SHEET, records::line_items_from_rows)
    });
    let job_times = tokio::task::spawn_blocking(move || {
        decode(job_times, "job times", records::JOB_TIMES_SHEET, records::job_times_from_rows)
    });
    let appointments = tokio::task::spawn_blocking(move || {
        decode(
            appointments,
            "appointments",
            records::APPOINTMENTS_SHEET,
            records::appointments_from_rows,
        )
    });

    let (opportunities, line_items, job_times, appointments) =
        tokio::try_join!(opportunities, line_items, job_times, appointments)?;
    Ok(SourceData {
        opportunities: opportunities?,
        line_items: line_items?,
        job_times: job_times?,
        appointments: appointments?,
    })
}

fn decode<T>(
    path: Option<PathBuf>,
    role: &str,
    sheet_name: &str,
    normalize: fn(&[RawRow]) -> Vec<T>,
) -> anyhow::Result<Vec<T>> {
    let Some(path) = path else {
        warn!("no {} file supplied; treating it as empty", role);
        return Ok(Vec::new());
    };
    sheets::validate_upload(&path)?;
    let rows = sheets::read_sheet(&path, sheet_name)
        .with_context(|| format!("failed to read the {} export {}", role, path.display()))?;
    Ok(normalize(&rows))
}
