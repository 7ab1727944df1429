use clap::Parser;
use log::{error, info, Level};
use simple_logger::init_with_level;

use galop::{cli::Args, core::run};

fn main() {
    let start = std::time::Instant::now();
    let args: Args = Args::parse();

    let level = if args.submission.verbose {
        Level::Debug
    } else {
        Level::Info
    };
    if let Err(e) = init_with_level(level) {
        eprintln!("ERROR: could not initialize logging: {}", e);
    }

    info!("{}", std::env::args().collect::<Vec<_>>().join(" "));

    let code = match run(args) {
        Ok(summary) => {
            info!("SUCCESS: {}", summary);
            0
        }
        Err(e) => {
            error!("ERROR: {}", e);
            1
        }
    };

    info!("Elapsed time: {:.3?}", start.elapsed());
    std::process::exit(code);
}
