use std::process::ExitCode;

fn main() -> ExitCode {
    hdist_launcher::main_entry()
}
