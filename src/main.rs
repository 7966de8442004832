fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = serialepub::cli::Args::parse();
    if let Err(e) = serialepub::logging::init(args.quiet) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
    if let Err(e) = serialepub::cli::run(&args) {
        tracing::error!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
