use clap::Parser;
use perpsim::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();
    run(cli)
}
