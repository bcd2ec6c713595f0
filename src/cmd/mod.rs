pub mod displays;
pub mod pipeline;
pub mod play;
pub mod resolve;

/// `m:ss` or `h:mm:ss`.
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
