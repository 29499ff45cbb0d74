fn main() {
    if let Err(err) = retail_cleanse::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
