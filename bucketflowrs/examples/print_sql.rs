use std::{env, fs, path::PathBuf};

use bucketflow::{render_request, AggregateRequest, BucketflowConfig};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Usage: print_sql <driver> <request_json>");
    eprintln!("Example: cargo run --example print_sql -- pgsql examples/requests/monthly_signups.json");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let driver = args.remove(0);
    let request_path = PathBuf::from(args.remove(0));

    let request_str = fs::read_to_string(request_path)?;
    let request: AggregateRequest = serde_json::from_str(&request_str)?;

    let config = BucketflowConfig::load_default();
    let defaults = config.for_datasource(&request.datasource).query;
    let sql = render_request(&driver, &defaults, &request)?;
    println!("{sql}");
    Ok(())
}
