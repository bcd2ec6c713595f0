use anyhow::Result;

use gst_fanout::{Config, Engine};

use super::format_duration;

pub async fn cmd_resolve(config: Config, url: &str, validate_only: bool) -> Result<()> {
    let engine = Engine::from_config(config);

    if validate_only {
        let outcome = engine.validate_source(url).await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    eprintln!("📡 Resolving: {url}");
    let outcome = engine.resolve_source(url).await;
    if !outcome.success {
        anyhow::bail!(outcome.message);
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub async fn cmd_search(config: Config, query: &str, limit: usize) -> Result<()> {
    let engine = Engine::from_config(config);

    eprintln!("🔍 Searching: {query}");
    let outcome = engine.search_sources(query, limit).await;
    if !outcome.success {
        anyhow::bail!(outcome.message);
    }

    let results = outcome.data.unwrap_or_default();
    for entry in &results {
        let duration = entry
            .duration
            .map(|d| format!(" ({})", format_duration(d)))
            .unwrap_or_default();
        println!(
            "{}  {}{}  [{}]",
            entry.id,
            entry.title.as_deref().unwrap_or("Unknown Title"),
            duration,
            entry.uploader.as_deref().unwrap_or("Unknown")
        );
        println!("    {}", entry.url);
    }
    eprintln!("\n({} results)", results.len());
    Ok(())
}
