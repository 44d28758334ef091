//! Terminal formatting for sizing and entry decisions.

use crate::engine::kelly::QuickSizing;
use crate::engine::EntryDecision;

pub const RULE_WIDTH: usize = 60;

/// Full-Kelly summary, or the rejection reason.
pub fn fmt_kelly(k: &QuickSizing) -> String {
    match (k.valid, k.f_star) {
        (true, Some(f_star)) => format!(
            "f*={:.1}%  ${:.0}  {} contracts  EV ${:.2}",
            f_star * 100.0,
            k.dollars,
            k.contracts,
            k.ev
        ),
        _ => format!("— ({})", k.reason),
    }
}

pub fn fmt_entry(d: &EntryDecision) -> String {
    let sizing = if d.kelly.f_max > 0.0 {
        format!(
            "  f_max={:.1}% ({:.2}x Kelly)  ${:.0}  {} contracts  EV ${:.2}",
            d.kelly.f_max * 100.0,
            d.kelly.kelly_multiplier,
            d.dollars,
            d.contracts,
            d.ev
        )
    } else {
        "  no sizing".to_string()
    };
    format!(
        "{}  score={}  survival={:.0}%  vol={:.3}  edge={}{}",
        d.recommendation,
        d.score,
        d.survival * 100.0,
        d.vol_remaining,
        fmt_edge(Some(d.raw_edge)),
        sizing
    )
}

/// Displayed edge: ESPN win percent minus ask, both in whole points.
pub fn calc_edge(wp_percent: Option<u32>, ask_cents: Option<u32>) -> Option<f64> {
    let (wp, ask) = (wp_percent?, ask_cents?);
    let edge = (wp as f64 - ask as f64) / 100.0;
    Some((edge * 10_000.0).round() / 10_000.0)
}

pub fn fmt_edge(edge: Option<f64>) -> String {
    match edge {
        Some(e) => format!("{:+.2}%", e * 100.0),
        None => "?".to_string(),
    }
}

pub fn fmt_opt<T: std::fmt::Display>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "?".to_string())
}

pub fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}
