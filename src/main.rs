fn main() {
    if let Err(err) = tablekit::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
