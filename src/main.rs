use std::process::ExitCode;

fn main() -> ExitCode {
    match umlens::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
