pub mod report;
pub mod techs;

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Compute the weekly KPI report for every technician found in the four
    /// spreadsheet exports.
    Report(report::Args),
    /// List the unique technician names found across the four exports.
    Techs(techs::Args),
}
