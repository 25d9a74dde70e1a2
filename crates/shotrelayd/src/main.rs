use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match shotrelayd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "shotrelayd: {error}");
            ExitCode::FAILURE
        }
    }
}
