use std::process::exit;

use guestnet::cli;

fn main() {
    match cli::run() {
        Ok(status) => {
            println!("{}", status);
            exit(cli::exit_code(&status));
        }
        Err(e) => {
            // Use eprintln! here in case logger does not initialize.
            eprintln!("Failed to reset network: {:#}", e);
            exit(1);
        }
    }
}
