use std::process::ExitCode;

fn main() -> ExitCode {
    match naijacare::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("naijacare: {e}");
            ExitCode::FAILURE
        }
    }
}
