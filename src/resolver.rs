//! Pure lookup from the reported place to a track file.

use thiserror::Error;

use crate::mapping::SanitizedMapping;

/// Neither the location nor the setting maps to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no track mapped for the current setting and location")]
pub struct NotFound;

/// Pick the track for `location`, falling back to the coarser `setting`.
///
/// Both lookups read the `tracks` table; the `settings` and `areas` tables
/// are matched against page content by the observers, not consulted here.
/// A location entry always wins over a setting entry. Empty track values
/// never match, so entries cleared during sanitization behave like absent
/// ones. No logging and no side effects; the caller decides what a miss
/// means.
pub fn resolve_track<'m>(
    mapping: &'m SanitizedMapping,
    setting: Option<&str>,
    location: &str,
) -> Result<&'m str, NotFound> {
    if let Some(track) = mapping.tracks().get(location).filter(|t| !t.is_empty()) {
        return Ok(track);
    }

    if let Some(setting) = setting {
        if let Some(track) = mapping.tracks().get(setting).filter(|t| !t.is_empty()) {
            return Ok(track);
        }
    }

    Err(NotFound)
}
