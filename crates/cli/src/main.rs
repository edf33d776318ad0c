use std::process::ExitCode;

fn main() -> ExitCode {
    nexus_cli::run()
}
