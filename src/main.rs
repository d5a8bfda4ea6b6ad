fn main() {
    repodiff::cli::init_logging();

    if let Err(code) = repodiff::cli::run() {
        std::process::exit(code);
    }
}
