use std::env;

use anyhow::{bail, Context};
use destination_resolver::{AppConfig, DestinationServices};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: destination-probe <text> | destination-probe --locate");
    }

    let services = DestinationServices::initialize(AppConfig::from_env())
        .context("failed to initialize destination services")?;
    let resolver = services.resolver();

    if args[0] == "--locate" {
        match resolver.use_current_location().await {
            Some(suggestion) => println!("{}\t{}", suggestion.value, suggestion.label),
            None => {
                let state = resolver.geolocation().state();
                bail!(state.error.unwrap_or_else(|| "no position available".into()));
            }
        }
    } else {
        let query = args.join(" ");
        resolver.set_text(query.clone());
        resolver.handle_debounced(query).await;
        for suggestion in resolver.snapshot().suggestions {
            println!("{}\t{}\t{}", suggestion.source.as_str(), suggestion.value, suggestion.label);
        }
        resolver.select_index(0);
    }

    let destination = resolver.submit();
    match destination {
        Ok(destination) => println!(
            "destination: {} (precise: {})",
            destination.location(),
            destination.is_precise()
        ),
        Err(err) => println!("destination: {err}"),
    }

    services.shutdown();
    Ok(())
}
