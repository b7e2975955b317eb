use serde::Serialize;

use crate::sheets::RawRow;
use crate::week::{parse_loose_date, WeekWindow};

pub const OPPORTUNITIES_SHEET: &str = "Opportunities";
pub const LINE_ITEMS_SHEET: &str = "Sold Line Items";
pub const JOB_TIMES_SHEET: &str = "Job Times";
pub const APPOINTMENTS_SHEET: &str = "Appointments";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpportunityStatus {
    Won,
    Lost,
    Pending,
}

impl OpportunityStatus {
    fn from_cell(text: &str) -> Self {
        match text {
            "Won" => Self::Won,
            "Lost" => Self::Lost,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobOutcome {
    Won,
    Lost,
    Invalid,
}

impl JobOutcome {
    fn from_cell(text: &str) -> Self {
        match text {
            "Won" => Self::Won,
            "Lost" => Self::Lost,
            _ => Self::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApptStatus {
    Cancelled,
    Completed,
    Pending,
}

impl ApptStatus {
    fn from_cell(text: &str) -> Self {
        match text {
            "Cancelled" => Self::Cancelled,
            "Completed" => Self::Completed,
            _ => Self::Pending,
        }
    }
}

/// One row of the "Opportunities" export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub date: String,
    pub job_id: String,
    pub customer: String,
    pub owner: String,
    pub status: OpportunityStatus,
    pub membership_offered: bool,
    pub membership_sold: bool,
    pub revenue: f64,
}

/// One row of the "Sold Line Items" export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub invoice_date: String,
    pub job_id: String,
    pub owner: String,
    pub category: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: f64,
}

/// One row of the "Job Times" export. The time and efficiency columns stay
/// as the export's text form ("4h 48m (288 mins)", "60 %"); they are parsed
/// where they are consumed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobTime {
    pub first_appointment: String,
    pub job_id: String,
    pub job_status: String,
    pub owner: String,
    pub outcome: JobOutcome,
    pub total_amount: String,
    pub total_time: String,
    pub sold_time: String,
    pub efficiency: String,
}

/// One row of the "Appointments" export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    pub appointment_id: String,
    pub scheduled_for: String,
    pub job_id: String,
    pub technician: String,
    pub status: ApptStatus,
    pub service_category: String,
    pub revenue: f64,
}

/// The four decoded collections. Treated as immutable once produced; the
/// filtering and grouping steps always build new collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceData {
    pub opportunities: Vec<Opportunity>,
    pub line_items: Vec<LineItem>,
    pub job_times: Vec<JobTime>,
    pub appointments: Vec<Appointment>,
}

// The exports mark membership flags with a literal "Yes". Other spellings
// have never counted toward the win rate, so this stays an exact match.
fn is_yes(text: &str) -> bool {
    text == "Yes"
}

pub fn opportunities_from_rows(rows: &[RawRow]) -> Vec<Opportunity> {
    rows.iter()
        .map(|row| Opportunity {
            date: row.text("Date"),
            job_id: row.text("Job"),
            customer: row.text("Customer"),
            owner: row.text("Opportunity Owner"),
            status: OpportunityStatus::from_cell(&row.text_or("Status", "Pending")),
            membership_offered: is_yes(&row.text_or("Membership Opportunity", "No")),
            membership_sold: is_yes(&row.text_or("Membership Sold", "No")),
            revenue: row.number("Revenue"),
        })
        .collect()
}

pub fn line_items_from_rows(rows: &[RawRow]) -> Vec<LineItem> {
    rows.iter()
        .map(|row| LineItem {
            invoice_date: row.text("Invoice Date"),
            job_id: row.text("Job"),
            owner: row.text("Opp. Owner"),
            category: row.text("Category"),
            description: row.text("Line Item"),
            quantity: row.number("Quantity") as i64,
            unit_price: row.number("Price"),
        })
        .collect()
}

pub fn job_times_from_rows(rows: &[RawRow]) -> Vec<JobTime> {
    rows.iter()
        .map(|row| JobTime {
            first_appointment: row.text("First Appointment"),
            job_id: row.text("Job"),
            job_status: row.text_or("Job Status", "Pending"),
            owner: row.text("Opportunity Owner"),
            outcome: JobOutcome::from_cell(&row.text_or("Opportunity", "Invalid")),
            total_amount: row.text_or("Total", "$0"),
            total_time: row.text_or("Total Time", "0h 0m (0 mins)"),
            sold_time: row.text_or("Sold Time", "0h 0m (0 mins)"),
            efficiency: row.text_or("Job Efficiency", "0 %"),
        })
        .collect()
}

pub fn appointments_from_rows(rows: &[RawRow]) -> Vec<Appointment> {
    rows.iter()
        .map(|row| Appointment {
            appointment_id: row.text("Appointment"),
            scheduled_for: row.text("Scheduled For"),
            job_id: row.text("Job"),
            technician: row.text("Technician"),
            status: ApptStatus::from_cell(&row.text_or("Appt Status", "Pending")),
            service_category: row.text("Service Category"),
            revenue: row.number("Revenue"),
        })
        .collect()
}

fn in_window(date_text: &str, window: &WeekWindow) -> bool {
    parse_loose_date(date_text).is_some_and(|instant| window.contains(instant))
}

/// Keeps only the records whose date field falls within `window`. Records
/// whose date does not parse are dropped silently; a malformed cell must not
/// abort the report.
pub fn filter_by_week(data: &SourceData, window: &WeekWindow) -> SourceData {
    SourceData {
        opportunities: data
            .opportunities
            .iter()
            .filter(|opp| in_window(&opp.date, window))
            .cloned()
            .collect(),
        line_items: data
            .line_items
            .iter()
            .filter(|item| in_window(&item.invoice_date, window))
            .cloned()
            .collect(),
        job_times: data
            .job_times
            .iter()
            .filter(|job| in_window(&job.first_appointment, window))
            .cloned()
            .collect(),
        appointments: data
            .appointments
            .iter()
            .filter(|appt| in_window(&appt.scheduled_for, window))
            .cloned()
            .collect(),
    }
}
