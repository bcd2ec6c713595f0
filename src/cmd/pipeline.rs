use anyhow::Result;

use gst_fanout::{Config, Engine};

pub async fn cmd_pipeline(
    config: Config,
    source: &str,
    displays: &[String],
    json: bool,
) -> Result<()> {
    let endpoints = config.select_displays(displays)?;
    let engine = Engine::from_config(config);
    let supervisor = engine.supervisor();

    let (descriptor, topology) = supervisor.prepare(source, &endpoints).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&topology)?);
        return Ok(());
    }

    eprintln!("🎬 Source: {descriptor}");
    eprintln!(
        "📺 {} display(s){}",
        topology.endpoint_count(),
        if topology.has_separate_audio() {
            ", separate audio"
        } else {
            ""
        }
    );
    println!("{}", supervisor.launcher().command_line(&topology));
    Ok(())
}
