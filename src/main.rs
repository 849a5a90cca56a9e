fn main() {
    #[cfg(feature = "cli")]
    zstream::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("zstream: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
