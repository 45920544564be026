//! Builds the single output line from stdin input, config and usage data.

use crate::cache::UsageCache;
use crate::config::{DisplayConfig, APP_NAME};
use crate::credentials::TokenSource;
use crate::error::Result;
use crate::fetcher::UsageTransport;
use crate::input::StatusInput;
use crate::render::{
    colorize_usage, format_reset_date_time, format_reset_time, format_tokens, is_anomalous,
};
use crate::store::UsageSnapshot;
use chrono::{DateTime, Utc};
use std::io::{Read, Write};
use tracing::warn;

const SEPARATOR: &str = " | ";

/// Render the status line fields enabled in `display`, without a trailing newline.
pub fn render_line(input: &StatusInput, usage: &UsageSnapshot, display: &DisplayConfig) -> String {
    let mut parts: Vec<String> = Vec::new();

    if display.show_app_name {
        parts.push(APP_NAME.to_string());
    }
    if display.show_model {
        parts.push(format!("Model: {}", input.model.display_name));
    }
    if display.show_tokens {
        parts.push(format!("Total Tokens: {}", format_tokens(input.total_tokens())));
    }
    if display.show_5h_usage {
        parts.push(format!(
            "5h: {}",
            colorize_usage(usage.utilization, display.bar_width)
        ));
    }
    if display.show_5h_resets {
        let reset = format_reset_time(&usage.resets_at);
        parts.push(format!("resets: {}", reset.as_deref().unwrap_or("N/A")));
    }
    if display.show_week_usage {
        parts.push(format!(
            "week: {}",
            colorize_usage(usage.weekly_utilization, display.bar_width)
        ));
    }
    if display.show_week_resets {
        let reset = format_reset_date_time(&usage.weekly_resets_at);
        parts.push(format!("resets: {}", reset.as_deref().unwrap_or("N/A")));
    }

    parts.join(SEPARATOR)
}

fn warn_on_anomalies(usage: &UsageSnapshot) {
    if is_anomalous(usage.utilization) {
        warn!("unexpected usage value: {:.1}", usage.utilization);
    }
    if is_anomalous(usage.weekly_utilization) {
        warn!("unexpected weekly usage value: {:.1}", usage.weekly_utilization);
    }
}

/// Read the session from `stdin`, resolve usage, and write one line to `stdout`.
///
/// Only unreadable input is an error. A failed usage lookup renders zeroed
/// usage, and a closed or broken `stdout` is logged and ignored.
pub async fn run<R, W, T, S>(
    stdin: R,
    mut stdout: W,
    display: &DisplayConfig,
    cache: &UsageCache<T, S>,
    now: DateTime<Utc>,
) -> Result<()>
where
    R: Read,
    W: Write,
    T: UsageTransport,
    S: TokenSource,
{
    let input = StatusInput::from_reader(stdin)?;

    let usage = match cache.resolve(now).await {
        Ok(usage) => usage,
        Err(e) => {
            warn!("{}", e);
            UsageSnapshot::default()
        }
    };
    warn_on_anomalies(&usage);

    let line = render_line(&input, &usage, display);
    if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
        warn!("failed to write status line: {}", e);
    }
    Ok(())
}
