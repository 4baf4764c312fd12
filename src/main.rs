fn main() {
    if let Err(err) = fimbul_integration::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
