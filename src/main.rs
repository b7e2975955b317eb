use clap::Parser;
use subcommands::Subcommand;

mod subcommands;

#[derive(Parser, Debug)]
#[command(about = "Weekly technician KPI reports from field-service spreadsheet exports")]
struct CliArgs {
    /// The command to perform.
    #[command(subcommand)]
    command: Subcommand,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // set up tracing
    tracing_subscriber::fmt::init();

    let CliArgs { command } = CliArgs::parse();

    match command {
        Subcommand::Report(args) => {
            subcommands::report::main(args).await?;
        }
        Subcommand::Techs(args) => {
            subcommands::techs::main(args).await?;
        }
    }

    Ok(())
}
