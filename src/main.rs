fn main() {
    if let Err(err) = sheet_assist::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
