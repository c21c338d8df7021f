//! Card display for session snapshots.
//!
//! Renders a [`SessionSnapshot`] as grouped, human-readable sections. Empty
//! sections are skipped.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use pneumoscan_core::{ImageOrigin, ImageView, InferenceResult, ModelStatus};
use pneumoscan_session::SessionSnapshot;

const MAX_LIST_ITEMS: usize = 10;

// ── Public API ──

/// Print a snapshot as a card on stdout.
pub fn print_snapshot(snapshot: &SessionSnapshot) {
    print!("{}", render_snapshot(snapshot));
}

/// Print a snapshot as pretty JSON on stdout.
pub fn print_snapshot_json(snapshot: &SessionSnapshot) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}

/// The result line shown under an identified image.
pub fn result_line(result: &InferenceResult) -> String {
    format!(
        "Probability of Covid Pneumonia: {:.2}% (Best Approximation)",
        result.percent()
    )
}

pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_card(&mut out, snapshot);
    out
}

// ── Section rendering ──

fn write_card(out: &mut String, s: &SessionSnapshot) -> std::fmt::Result {
    writeln!(out, "=== pneumoscan ===")?;
    writeln!(out)?;

    writeln!(out, "Model")?;
    row(out, "state", model_label(s.model_state))?;
    if let Some(reason) = &s.model_error {
        row(out, "error", reason)?;
    }
    writeln!(out)?;

    writeln!(out, "Image")?;
    match &s.current_image {
        Some(image) => {
            row(out, "source", origin_label(image.origin))?;
            row(out, "location", &image.locator)?;
        }
        None => row(out, "source", "(none selected)")?,
    }
    if s.identifying {
        row(out, "status", "identifying...")?;
    } else if let Some(result) = &s.current_result {
        row(out, "result", &result_line(result))?;
    } else if s.can_identify {
        row(out, "status", "ready to identify")?;
    }
    if let Some(err) = &s.last_error {
        row(out, "error", err)?;
    }
    writeln!(out)?;

    if !s.history.is_empty() {
        writeln!(out, "History ({})", s.history.len())?;
        let show = s.history.len().min(MAX_LIST_ITEMS);
        for (i, entry) in s.history.iter().take(show).enumerate() {
            writeln!(
                out,
                "  [{i}] {}  {:<8} {}",
                local_time(entry.selected_at),
                origin_label(entry.image.origin),
                shorten(&entry.image)
            )?;
        }
        if s.history.len() > MAX_LIST_ITEMS {
            writeln!(out, "    ... and {} more", s.history.len() - MAX_LIST_ITEMS)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn row(out: &mut String, label: &str, value: &str) -> std::fmt::Result {
    writeln!(out, "  {label:<12} {value}")
}

// ── Helpers ──

fn model_label(status: ModelStatus) -> &'static str {
    match status {
        ModelStatus::Unloaded => "not loaded",
        ModelStatus::Loading => "loading...",
        ModelStatus::Ready => "ready",
        ModelStatus::Failed => "failed",
    }
}

fn origin_label(origin: ImageOrigin) -> &'static str {
    match origin {
        ImageOrigin::Uploaded => "upload",
        ImageOrigin::RemoteUrl => "url",
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn shorten(image: &ImageView) -> String {
    let locator = &image.locator;
    if locator.chars().count() > 60 {
        let head: String = locator.chars().take(57).collect();
        format!("{head}...")
    } else {
        locator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pneumoscan_core::HistoryView;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            is_model_loading: false,
            model_state: ModelStatus::Ready,
            model_error: None,
            current_image: None,
            current_result: None,
            identifying: false,
            can_identify: false,
            last_error: None,
            history: Vec::new(),
        }
    }

    fn remote(url: &str) -> ImageView {
        ImageView {
            origin: ImageOrigin::RemoteUrl,
            locator: url.into(),
        }
    }

    #[test]
    fn result_line_has_two_decimals() {
        let line = result_line(&InferenceResult::new(0.731_058_6));
        assert_eq!(
            line,
            "Probability of Covid Pneumonia: 73.11% (Best Approximation)"
        );
    }

    #[test]
    fn card_shows_result_for_current_image() {
        let mut s = snapshot();
        s.current_image = Some(remote("https://example.org/xray.png"));
        s.current_result = Some(InferenceResult::new(0.25));
        let card = render_snapshot(&s);
        assert!(card.contains("https://example.org/xray.png"));
        assert!(card.contains("25.00%"));
    }

    #[test]
    fn card_omits_empty_history() {
        assert!(!render_snapshot(&snapshot()).contains("History"));
    }

    #[test]
    fn long_history_is_truncated() {
        let mut s = snapshot();
        s.history = (0..MAX_LIST_ITEMS + 3)
            .map(|i| HistoryView {
                image: remote(&format!("https://example.org/{i}.png")),
                selected_at: Utc::now(),
            })
            .collect();
        let card = render_snapshot(&s);
        assert!(card.contains("... and 3 more"));
        assert!(!card.contains(&format!("/{}.png", MAX_LIST_ITEMS)));
    }

    #[test]
    fn long_locators_are_shortened() {
        let url = format!("https://example.org/{}", "a".repeat(100));
        let short = shorten(&remote(&url));
        assert_eq!(short.chars().count(), 60);
        assert!(short.ends_with("..."));
    }
}
