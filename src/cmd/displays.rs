use anyhow::Result;

use gst_fanout::Config;

pub fn cmd_displays(config: &Config, all: bool) {
    let displays: Vec<_> = config
        .displays
        .endpoints
        .iter()
        .filter(|d| all || d.enabled)
        .collect();

    if displays.is_empty() {
        eprintln!("No displays configured");
        return;
    }

    for display in &displays {
        let audio = display
            .audio_port()
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "{:<20} {:>15}  video:{:<5} audio:{:<5}{}",
            display.name,
            display.host,
            display.port,
            audio,
            if display.enabled { "" } else { "  (disabled)" }
        );
    }
}

pub fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
