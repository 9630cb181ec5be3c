mod cli;
mod params;
mod paths;
mod preview;
mod run;
mod selection;
mod session;
mod snapshot;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
