use std::sync::Arc;

use authgate::config::{load_config, print_schema};
use authgate::startup::run;
use authgate::utils::logger::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--schema") {
        print_schema()?;
        return Ok(());
    }

    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .or_else(|| std::env::var("AUTHGATE_CONFIG").ok());
    let config = load_config(path.as_deref());

    init_logging(&config.logging)?;

    run(Arc::new(config)).await
}
