use std::path::PathBuf;

use drainkpi::tools::kpi;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// The "Opportunities" workbook.
    #[arg(long)]
    opportunities: Option<PathBuf>,

    /// The "Sold Line Items" workbook.
    #[arg(long)]
    line_items: Option<PathBuf>,

    /// The "Job Times" workbook.
    #[arg(long)]
    job_times: Option<PathBuf>,

    /// The "Appointments" workbook.
    #[arg(long)]
    appointments: Option<PathBuf>,
}

pub async fn main(args: Args) -> anyhow::Result<()> {
    let Args { opportunities, line_items, job_times, appointments } = args;

    let sources =
        super::report::load_sources(opportunities, line_items, job_times, appointments).await?;
    for name in kpi::unique_technicians(&sources) {
        println!("{}", name);
    }

    Ok(())
}
