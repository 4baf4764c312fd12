fn main() {
    if let Err(err) = fimbul_integration::app::run() {
        eprintln!("weather observation sync failed: {err}");
        std::process::exit(1);
    }
}
