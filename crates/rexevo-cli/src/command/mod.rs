use clap::{Parser, Subcommand};

use self::{inspect::InspectArg, train::TrainArg};

mod inspect;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve controllers against the simulated runner
    Train(#[clap(flatten)] TrainArg),
    /// Show the genomes of a saved genome set
    Inspect(#[clap(flatten)] InspectArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(train::run(&arg))?;
        }
        Mode::Inspect(arg) => inspect::run(&arg)?,
    }
    Ok(())
}
