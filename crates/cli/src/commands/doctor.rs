//! `supportdesk doctor`: Diagnose configuration and store health.

use super::{config_path, open_store};
use std::path::Path;
use supportdesk_config::AppConfig;
use supportdesk_core::{Embedder, KnowledgeStore};

pub async fn run(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("SupportDesk Doctor: System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let path = config_path(explicit);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults (run `supportdesk init`)", path.display());
    }

    let config = match AppConfig::load_with_env(&path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config and re-run.");
            return Ok(());
        }
    };

    // Generation
    match supportdesk_providers::router::build_base_provider(&config) {
        Ok(provider) => println!(
            "  ✅ Generation provider: {} ({}) at {}",
            config.generation.provider,
            config.generation.model,
            provider.base_url()
        ),
        Err(e) => {
            println!("  ❌ Generation provider: {e}");
            issues += 1;
        }
    }

    // Embeddings
    match supportdesk_providers::build_embedder(&config) {
        Ok(embedder) => println!(
            "  ✅ Embedder: {} ({})",
            config.embedding.provider,
            embedder.model()
        ),
        Err(e) => {
            println!("  ❌ Embedder: {e}");
            issues += 1;
        }
    }

    // Knowledge base directory
    if config.ingest.kb_dir.is_dir() {
        println!("  ✅ Knowledge-base directory: {}", config.ingest.kb_dir.display());
    } else {
        println!(
            "  ⚠️  Knowledge-base directory missing: {}",
            config.ingest.kb_dir.display()
        );
        issues += 1;
    }

    // Store
    match open_store(&config).await {
        Ok(store) => match store.count().await {
            Ok(0) => {
                println!("  ⚠️  Store '{}' is empty, run `supportdesk ingest`", store.name());
                issues += 1;
            }
            Ok(n) => println!("  ✅ Store '{}': {n} chunk(s)", store.name()),
            Err(e) => {
                println!("  ❌ Store '{}' unreadable: {e}", store.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Store unavailable: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
