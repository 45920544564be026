//! Formatting helpers for the status line: token counts, usage bars, reset times.

use chrono::{DateTime, Duration, DurationRound, Local, Utc};
use console::Style;

/// Partial-block glyphs from fullest to emptiest, with the fraction of a cell
/// each one needs. Anything above zero but under 1/6 gets the thinnest glyph.
const SHADES: [(f64, &str); 5] = [
    (5.0 / 6.0, "▇"),
    (4.0 / 6.0, "▆"),
    (3.0 / 6.0, "▅"),
    (2.0 / 6.0, "▃"),
    (1.0 / 6.0, "▂"),
];
const THINNEST_SHADE: &str = "▁";
const FULL_BLOCK: &str = "█";

const THRESHOLD_YELLOW: f64 = 25.0;
const THRESHOLD_ORANGE: f64 = 50.0;
const THRESHOLD_RED: f64 = 75.0;

/// `500` stays `500`; from 1000 up, thousands with one decimal (`1.5k`).
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1000 {
        format!("{:.1}k", tokens as f64 / 1000.0)
    } else {
        tokens.to_string()
    }
}

fn usage_style(usage: f64) -> Style {
    let style = Style::new().force_styling(true);
    if usage < THRESHOLD_YELLOW {
        style.green()
    } else if usage < THRESHOLD_ORANGE {
        style.yellow()
    } else if usage < THRESHOLD_RED {
        style.color256(208)
    } else {
        style.red()
    }
}

/// The bar body, exactly `width` characters. Out-of-range usage is clipped to
/// an empty or full bar.
pub fn usage_bar(usage: f64, width: usize) -> String {
    let total_blocks = (usage / 100.0 * width as f64).max(0.0);
    let filled = (total_blocks.floor() as usize).min(width);

    let mut bar = FULL_BLOCK.repeat(filled);
    let mut used = filled;
    if filled < width {
        let fraction = total_blocks - filled as f64;
        let shade = SHADES
            .iter()
            .find(|(threshold, _)| fraction >= *threshold)
            .map(|(_, glyph)| *glyph)
            .or((fraction > 0.0).then_some(THINNEST_SHADE));
        if let Some(glyph) = shade {
            bar.push_str(glyph);
            used += 1;
        }
    }
    bar.push_str(&" ".repeat(width - used));
    bar
}

/// `45.0% [█████████         ]` wrapped in one color span chosen by usage tier.
pub fn colorize_usage(usage: f64, width: usize) -> String {
    let text = format!("{:.1}% [{}]", usage, usage_bar(usage, width));
    usage_style(usage).apply_to(text).to_string()
}

/// Round up to the next whole minute; exact minutes are left alone.
pub fn round_up_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    let minute = Duration::minutes(1);
    match t.duration_trunc(minute) {
        Ok(truncated) if truncated < t => truncated + minute,
        Ok(truncated) => truncated,
        Err(_) => t,
    }
}

fn parse_reset(resets_at: &str) -> Option<DateTime<Local>> {
    if resets_at.is_empty() {
        return None;
    }
    let parsed = DateTime::parse_from_rfc3339(resets_at).ok()?;
    Some(round_up_to_minute(parsed.with_timezone(&Utc)).with_timezone(&Local))
}

/// Reset time as local `HH:MM`, or `None` if missing or unparsable.
pub fn format_reset_time(resets_at: &str) -> Option<String> {
    parse_reset(resets_at).map(|t| t.format("%H:%M").to_string())
}

/// Reset time as local `MM/DD HH:MM`, or `None` if missing or unparsable.
pub fn format_reset_date_time(resets_at: &str) -> Option<String> {
    parse_reset(resets_at).map(|t| t.format("%m/%d %H:%M").to_string())
}

/// Whether a utilization figure falls outside the expected 0-100 range.
pub fn is_anomalous(usage: f64) -> bool {
    !(0.0..=100.0).contains(&usage)
}
