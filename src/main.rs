//! Binary entry point for `flourish`.

use std::process;

fn main() {
    if let Err(e) = flourish_fs::run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
