//! Operator-facing session status (badge text plus a tooltip line pair).

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::protocol::Location;

/// Badge text shown while the session is muted.
pub const MUTE_BADGE: &str = "MUTE";

/// Placeholder for a setting or location that has not been reported yet.
const UNSET: &str = "-";

/// Snapshot of what the session is doing, formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    /// Short badge text; empty when nothing needs attention.
    pub badge: String,
    /// Two-line summary: `Setting: <s>` and `Location: <l>`.
    pub tooltip: String,
}

impl StatusView {
    pub fn compose(muted: bool, setting: Option<&str>, location: Option<&Location>) -> Self {
        let badge = if muted {
            MUTE_BADGE.to_string()
        } else {
            String::new()
        };
        let setting = setting.unwrap_or(UNSET);
        let location = location
            .map(Location::to_string)
            .unwrap_or_else(|| UNSET.to_string());
        Self {
            badge,
            tooltip: format!("Setting: {setting}\nLocation: {location}"),
        }
    }
}

impl Default for StatusView {
    fn default() -> Self {
        Self::compose(false, None, None)
    }
}

/// Sink for status snapshots. Synchronous on purpose so the session can
/// refresh it from any code path without awaiting.
pub trait StatusIndicator: Send + Sync {
    fn update(&self, status: &StatusView);
}

/// StatusIndicator that keeps the latest snapshot for the HTTP API.
#[derive(Default)]
pub struct StatusCell {
    current: RwLock<StatusView>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> StatusView {
        self.current.read().clone()
    }
}

impl StatusIndicator for StatusCell {
    fn update(&self, status: &StatusView) {
        debug!(badge = %status.badge, tooltip = %status.tooltip, "Status updated");
        *self.current.write() = status.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_uses_placeholders_until_reports_arrive() {
        let view = StatusView::default();
        assert_eq!(view.badge, "");
        assert_eq!(view.tooltip, "Setting: -\nLocation: -");
    }

    #[test]
    fn compose_reflects_mute_and_reported_names() {
        let view = StatusView::compose(
            true,
            Some("Below the Map"),
            Some(&Location::Named("Spite".to_string())),
        );
        assert_eq!(view.badge, MUTE_BADGE);
        assert_eq!(view.tooltip, "Setting: Below the Map\nLocation: Spite");
    }

    #[test]
    fn unknown_location_shows_its_sentinel_name() {
        let view = StatusView::compose(false, None, Some(&Location::Unknown));
        assert_eq!(view.tooltip, "Setting: -\nLocation: UNKNOWN");
    }

    #[test]
    fn cell_hands_out_the_latest_snapshot() {
        let cell = StatusCell::new();
        assert_eq!(cell.get(), StatusView::default());

        let view = StatusView::compose(true, Some("Docklands"), None);
        cell.update(&view);
        assert_eq!(cell.get(), view);
    }
}
