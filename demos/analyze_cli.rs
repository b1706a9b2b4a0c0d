//! A small driver binary: reads one source file per thread from the command line, explores every
//! legal interleaving, and prints the resulting observable set as JSON.
//!
//! ```text
//! cargo run --example analyze_cli -- threads/writer.txt threads/reader.txt
//! ```

use std::fs;
use std::process::ExitCode;

use jmm_explorer::collector::Collector;

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let mut args = pico_args::Arguments::from_env();
    let paths = args.free_os().expect("invalid command-line arguments");
    if paths.is_empty() {
        eprintln!("usage: analyze_cli <thread-source-file>...");
        return ExitCode::FAILURE;
    }

    let names: Vec<String> =
        paths.iter().map(|p| p.to_string_lossy().trim_start_matches("./").to_string()).collect();
    let sources: Vec<String> = paths
        .iter()
        .map(|p| fs::read_to_string(p).unwrap_or_else(|e| panic!("reading {:?}: {}", p, e)))
        .collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let source_refs: Vec<&str> = sources.iter().map(String::as_str).collect();

    let mut results = Collector::new();
    let mut had_error = false;
    let failed = jmm_explorer::analyze(&name_refs, &source_refs, &mut results, |msg| {
        had_error = true;
        eprintln!("{}", msg);
    });

    if failed || had_error {
        return ExitCode::FAILURE;
    }

    println!("{} thread(s), {} distinct observable(s):", paths.len(), results.len());
    for observable in results.iter() {
        println!("{}", serde_json::to_string(observable).expect("Observable always serializes"));
    }
    ExitCode::SUCCESS
}
