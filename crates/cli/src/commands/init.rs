//! `supportdesk init`: Write a default config file.

use super::config_path;
use std::path::Path;
use supportdesk_config::AppConfig;

pub async fn run(explicit: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(explicit);

    println!("SupportDesk: Setup");
    println!("===================\n");

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("  Created config directory: {}", dir.display());
        }
    }

    if path.exists() && !force {
        println!("  Config already exists at: {}", path.display());
        println!("  Edit it manually, or re-run with --force to overwrite.\n");
        return Ok(());
    }

    std::fs::write(&path, AppConfig::default_toml())?;
    println!("  Wrote config: {}", path.display());
    println!("\nNext steps:");
    println!("  1. Set SUPPORTDESK_API_KEY (or OPENAI_API_KEY), or generation.api_key in the file");
    println!("  2. Put *.txt knowledge-base files in the ingest.kb_dir directory (default: data/kb)");
    println!("  3. Run: supportdesk ingest");
    println!("  4. Run: supportdesk ask \"How do I factory reset my headset?\"\n");

    Ok(())
}
