use calamine::Data;
use chrono::NaiveDate;
use drainkpi::records::{self, SourceData};
use drainkpi::session::{self, SessionAction, SessionState};
use drainkpi::sheets::RawRow;
use drainkpi::tools::kpi::{output, Band, Metric, TechnicianKpis};
use drainkpi::week::WeekWindow;

// ---------------------------------------------------------------------------
// Test data fixtures
// ---------------------------------------------------------------------------

fn row(pairs: &[(&str, Data)]) -> RawRow {
    RawRow::from_pairs(pairs.iter().map(|(key, value)| ((*key).to_owned(), value.clone())))
}

fn text(value: &str) -> Data {
    Data::String(value.to_owned())
}

/// A realistic week of exports for two technicians. The report week is
/// 2025-08-18 (Monday) through 2025-08-24 (Sunday); a few rows fall outside
/// it or carry malformed dates.
fn sample_sources() -> SourceData {
    let opportunities = records::opportunities_from_rows(&[
        // Jane: 3 won (100/200/300), 1 lost (500), one membership offer sold
        row(&[
            ("Date", text("08/19/2025")),
            ("Job", Data::Float(9001.0)),
            ("Customer", text("Hilltop Cafe")),
            ("Opportunity Owner", text("Jane Smith")),
            ("Status", text("Won")),
            ("Membership Opportunity", text("Yes")),
            ("Membership Sold", text("Yes")),
            ("Revenue", Data::Float(100.0)),
        ]),
        row(&[
            ("Date", text("08/20/2025")),
            ("Job", Data::Float(9002.0)),
            ("Opportunity Owner", text("jane smith")),
            ("Status", text("Won")),
            ("Membership Opportunity", text("Yes")),
            ("Revenue", Data::Float(200.0)),
        ]),
        row(&[
            ("Date", text("08/21/2025")),
            ("Job", Data::Float(9003.0)),
            ("Opportunity Owner", text(" JANE SMITH ")),
            ("Status", text("Won")),
            ("Revenue", Data::Float(300.0)),
        ]),
        row(&[
            ("Date", text("08/22/2025")),
            ("Job", Data::Float(9004.0)),
            ("Opportunity Owner", text("Jane Smith")),
            ("Status", text("Lost")),
            ("Revenue", Data::Float(500.0)),
        ]),
        // Bob: one won opportunity, shared job id with an appointment below
        row(&[
            ("Date", text("08/19/2025")),
            ("Job", Data::Float(9100.0)),
            ("Opportunity Owner", text("Bob Lee")),
            ("Status", text("Won")),
            ("Revenue", Data::Float(100.0)),
        ]),
        // outside the report week
        row(&[
            ("Date", text("08/26/2025")),
            ("Job", Data::Float(9200.0)),
            ("Opportunity Owner", text("Jane Smith")),
            ("Status", text("Won")),
            ("Revenue", Data::Float(5000.0)),
        ]),
        // malformed date, dropped silently
        row(&[
            ("Date", text("sometime")),
            ("Job", Data::Float(9300.0)),
            ("Opportunity Owner", text("Jane Smith")),
            ("Status", text("Won")),
            ("Revenue", Data::Float(5000.0)),
        ]),
    ]);

    let line_items = records::line_items_from_rows(&[
        row(&[
            ("Invoice Date", text("08/20/2025")),
            ("Job", Data::Float(9001.0)),
            ("Opp. Owner", text("Jane Smith")),
            ("Line Item", text("Hydro jetting and descaling combo")),
            ("Quantity", Data::Int(1)),
            ("Price", Data::Float(450.0)),
        ]),
        row(&[
            ("Invoice Date", text("08/21/2025")),
            ("Job", Data::Float(9002.0)),
            ("Opp. Owner", text("Jane Smith")),
            ("Line Item", text("50 gallon water heater install")),
            ("Quantity", Data::Int(1)),
            ("Price", Data::Float(1800.0)),
        ]),
    ]);

    let job_times = records::job_times_from_rows(&[
        row(&[
            ("First Appointment", text("08/19/2025 08:00 AM")),
            ("Job", Data::Float(9001.0)),
            ("Opportunity Owner", text("Jane Smith")),
            ("Opportunity", text("Won")),
            ("Job Efficiency", text("60 %")),
        ]),
        row(&[
            ("First Appointment", text("08/20/2025 08:00 AM")),
            ("Job", Data::Float(9002.0)),
            ("Opportunity Owner", text("Jane Smith")),
            ("Opportunity", text("Won")),
            ("Job Efficiency", text("0 %")),
        ]),
        row(&[
            ("First Appointment", text("08/21/2025 08:00 AM")),
            ("Job", Data::Float(9003.0)),
            ("Opportunity Owner", text("Jane Smith")),
            ("Opportunity", text("Won")),
            ("Job Efficiency", text("not a number")),
        ]),
    ]);

    let appointments = records::appointments_from_rows(&[
        // same job id as Bob's opportunity; revenue is counted twice
        row(&[
            ("Appointment", Data::Float(1.0)),
            ("Scheduled For", text("08/19/2025 09:00 AM")),
            ("Job", Data::Float(9100.0)),
            ("Technician", text("Bob Lee")),
            ("Appt Status", text("Completed")),
            ("Revenue", Data::Float(100.0)),
        ]),
    ]);

    SourceData { opportunities, line_items, job_times, appointments }
}

fn report_week() -> WeekWindow {
    WeekWindow::containing(NaiveDate::from_ymd_opt(2025, 8, 18).unwrap())
}

fn compute(sources: SourceData) -> Vec<TechnicianKpis> {
    let state =
        session::reduce(&SessionState::default(), SessionAction::SelectWeek(report_week()))
            .unwrap();
    let state = session::reduce(&state, SessionAction::LoadSources(sources)).unwrap();
    state.report
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn full_pipeline_merges_name_spellings_and_filters_the_week() {
    let report = compute(sample_sources());

    // insertion order across sources: Jane first, then Bob
    let names: Vec<_> = report.iter().map(|entry| entry.technician.as_str()).collect();
    assert_eq!(names, ["Jane Smith", "Bob Lee"]);

    let jane = &report[0].metrics;
    assert_eq!(jane.job_close_rate, 75.0);
    assert_eq!(jane.average_ticket_value, 200.0);
    // the out-of-week and malformed-date rows contributed nothing
    assert_eq!(jane.weekly_revenue, 1100.0);
    assert_eq!(jane.job_efficiency, 60.0);
    assert_eq!(jane.membership_win_rate, 50.0);
    assert_eq!(jane.hydro_jetting_jobs, 1);
    assert_eq!(jane.descaling_jobs, 1);
    assert_eq!(jane.water_heater_jobs, 1);
}

#[test]
fn shared_job_revenue_is_counted_in_both_sources() {
    let report = compute(sample_sources());
    let bob = report.iter().find(|entry| entry.technician == "Bob Lee").unwrap();
    assert_eq!(bob.metrics.weekly_revenue, 200.0);
}

#[test]
fn rerunning_the_pipeline_yields_identical_output() {
    let first = compute(sample_sources());
    let second = compute(sample_sources());
    assert_eq!(first, second);

    let mut a = Vec::new();
    let mut b = Vec::new();
    output::json::print_report(&first, &report_week(), &mut a).unwrap();
    output::json::print_report(&second, &report_week(), &mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_job_id_aborts_the_pipeline() {
    let mut sources = sample_sources();
    sources.opportunities[0].job_id.clear();
    let state =
        session::reduce(&SessionState::default(), SessionAction::SelectWeek(report_week()))
            .unwrap();
    let err = session::reduce(&state, SessionAction::LoadSources(sources)).unwrap_err();
    assert!(err.to_string().contains("Opportunity 1: Missing Job ID"), "{err}");
}

#[test]
fn human_output_carries_threshold_bands() {
    let report = compute(sample_sources());
    let mut out = Vec::new();
    output::human::print_report(&report, &report_week(), &mut out).unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Jane Smith"));
    assert!(printed.contains("Job Close Rate"));
    // close rate 75.0 sits between warning (60) and good (80)
    assert_eq!(Metric::JobCloseRate.band(&report[0].metrics), Band::Warning);
    assert!(printed.contains("[warning]"));
}

#[test]
fn csv_output_has_one_row_per_technician() {
    let report = compute(sample_sources());
    let mut out = Vec::new();
    output::csv::print_report(&report, &report_week(), &mut out).unwrap();
    let printed = String::from_utf8(out).unwrap();
    let lines: Vec<_> = printed.lines().collect();
    assert_eq!(lines.len(), 1 + report.len());
    assert!(lines[0].starts_with("Technician,Average Ticket Value"));
}
