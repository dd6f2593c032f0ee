use std::process::ExitCode;

fn main() -> ExitCode {
    homecat_cli::run()
}
