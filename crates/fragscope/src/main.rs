mod cli;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config = run::load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Run(args) => run::run(args, config),
        Command::Translate(args) => run::translate(args),
        Command::Check(args) => run::check(args, &config),
    }
}
