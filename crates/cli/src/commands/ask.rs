//! `supportdesk ask`: Answer one question from the terminal.

use super::{build_pipeline, load_config, open_store};
use std::path::Path;

pub async fn run(
    explicit: Option<&Path>,
    query: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(explicit)?;
    let store = open_store(&config).await?;
    let pipeline = build_pipeline(&config, store).await?;

    let response = pipeline.answer(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}\n", response.final_answer);
    if !response.sources.is_empty() {
        println!("Sources:");
        for (i, source) in response.sources.iter().enumerate() {
            println!("  {}. {}", i + 1, source);
        }
    }

    Ok(())
}
