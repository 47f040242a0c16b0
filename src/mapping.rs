//! The mapping document: which track plays where.
//!
//! The pack ships a single `mappings.json` with three name tables. On first
//! use the store reads it, clears entries whose audio file is absent, hands
//! the verified file set to the player for preloading and then serves the
//! sanitized result to every later caller. A broken or unreadable document
//! degrades to an empty mapping so the rest of the session keeps working.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::player::TrackPlayer;
use crate::resources::ResourceStore;

/// Mapping document path inside the resource pack.
pub const MAPPING_FILE: &str = "mappings.json";

/// Directory inside the pack that holds the audio files.
pub const TRACKS_DIR: &str = "tracks";

/// Pack path of one track file.
pub fn track_resource_path(track: &str) -> String {
    format!("{TRACKS_DIR}/{track}")
}

/// Raw shape of `mappings.json`. All three tables must be present.
///
/// `tracks` maps location and setting names to track files and is the only
/// table resolution reads. `settings` and `areas` describe how observers
/// recognize the current context; they are broadcast verbatim and never
/// interpreted here. An empty track value means "no track".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    pub tracks: HashMap<String, String>,
    pub settings: HashMap<String, String>,
    pub areas: HashMap<String, String>,
}

impl MappingDocument {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Non-empty track entries whose file is not in the pack, as
    /// `(location, file)` pairs in location order.
    pub async fn missing_tracks(&self, resources: &dyn ResourceStore) -> Vec<(String, String)> {
        let mut entries: Vec<(&String, &String)> = self.tracks.iter().collect();
        entries.sort();

        let mut missing = Vec::new();
        for (location, file) in entries {
            if file.is_empty() {
                continue;
            }
            if !resources.exists(&track_resource_path(file)).await {
                missing.push((location.clone(), file.clone()));
            }
        }
        missing
    }
}

/// Why the mapping document could not be produced.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file is missing from the pack or unreadable.
    #[error("could not read mapping data: {0:#}")]
    Read(anyhow::Error),
    /// The file is not JSON of the expected shape.
    #[error("mapping data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read and parse the raw document, without verifying track files.
pub async fn read_document(resources: &dyn ResourceStore) -> Result<MappingDocument, DocumentError> {
    let text = resources
        .read_text(MAPPING_FILE)
        .await
        .map_err(DocumentError::Read)?;
    Ok(MappingDocument::parse(&text)?)
}

/// A document whose non-empty track entries all point at files present in
/// the pack.
///
/// Only the store can mint one, so holding a `SanitizedMapping` is proof
/// that verification already ran. Serializes exactly like the raw document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SanitizedMapping(MappingDocument);

impl SanitizedMapping {
    /// Wrap a document that is known to be clean (tests and fixtures).
    #[cfg(test)]
    pub(crate) fn trusted(document: MappingDocument) -> Self {
        Self(document)
    }

    pub fn tracks(&self) -> &HashMap<String, String> {
        &self.0.tracks
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.0.settings
    }

    pub fn areas(&self) -> &HashMap<String, String> {
        &self.0.areas
    }
}

/// Lazily loads, verifies and caches the mapping document.
///
/// The first `load` does all the work; concurrent and later calls share the
/// one cached result. Failures never propagate: a document that cannot be
/// produced is replaced by an empty one and the player still receives its
/// (then empty) preload set.
pub struct MappingStore {
    resources: Arc<dyn ResourceStore>,
    player: Arc<dyn TrackPlayer>,
    mapping: OnceCell<SanitizedMapping>,
}

impl MappingStore {
    pub fn new(resources: Arc<dyn ResourceStore>, player: Arc<dyn TrackPlayer>) -> Self {
        Self {
            resources,
            player,
            mapping: OnceCell::new(),
        }
    }

    /// The sanitized mapping, loading it on first use.
    pub async fn load(&self) -> &SanitizedMapping {
        self.mapping.get_or_init(|| self.load_inner()).await
    }

    async fn load_inner(&self) -> SanitizedMapping {
        let document = match read_document(self.resources.as_ref()).await {
            Ok(document) => document,
            Err(err) => {
                error!("Failed to load mapping data: {err}");
                MappingDocument::default()
            }
        };

        let (mapping, verified) = self.sanitize(document).await;
        if let Err(err) = self.player.load_tracks(verified).await {
            warn!("Player rejected the preload set: {err:#}");
        }

        info!("✅ Mappings loaded.");
        debug!(
            locations = mapping.tracks().len(),
            settings = mapping.settings().len(),
            areas = mapping.areas().len(),
            "Mapping tables ready"
        );
        mapping
    }

    /// Clear track entries whose file is absent and collect the verified
    /// files as the preload set.
    ///
    /// Cleared entries keep their location key with an empty value, so the
    /// mapping sent to observers still lists every known location.
    async fn sanitize(&self, mut document: MappingDocument) -> (SanitizedMapping, HashSet<String>) {
        let mut verified: HashSet<String> = document
            .tracks
            .values()
            .filter(|file| !file.is_empty())
            .cloned()
            .collect();

        for (location, file) in document.missing_tracks(self.resources.as_ref()).await {
            error!("Location \"{location}\" is missing track: {file}");
            verified.remove(&file);
            if let Some(track) = document.tracks.get_mut(&location) {
                track.clear();
            }
        }

        (SanitizedMapping(document), verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakePlayer, MemStore, PlayerCall};

    const SAMPLE: &str = r#"{
        "tracks": {"Wolfstack Docks": "docks.mp3", "Spite": "spite.mp3", "Ladybones Road": ""},
        "settings": {"Below the Map": "below.mp3"},
        "areas": {"Wolfstack Docks": "Below the Map"}
    }"#;

    #[test]
    fn parse_reads_all_three_tables() {
        let document = MappingDocument::parse(SAMPLE).unwrap();
        assert_eq!(document.tracks["Wolfstack Docks"], "docks.mp3");
        assert_eq!(document.settings["Below the Map"], "below.mp3");
        assert_eq!(document.areas["Wolfstack Docks"], "Below the Map");
    }

    #[test]
    fn parse_requires_every_table() {
        let err = MappingDocument::parse(r#"{"tracks": {}, "settings": {}}"#).unwrap_err();
        assert!(err.to_string().contains("areas"));
    }

    #[test]
    fn track_paths_live_under_the_tracks_dir() {
        assert_eq!(track_resource_path("docks.mp3"), "tracks/docks.mp3");
    }

    fn store_with(resources: MemStore) -> (MappingStore, Arc<FakePlayer>) {
        let player = Arc::new(FakePlayer::new());
        let store = MappingStore::new(Arc::new(resources), player.clone());
        (store, player)
    }

    #[tokio::test]
    async fn load_clears_entries_with_missing_files_and_preloads_the_rest() {
        let resources = MemStore::new()
            .with_file(MAPPING_FILE, SAMPLE)
            .with_file("tracks/docks.mp3", "riff");
        let (store, player) = store_with(resources);

        let mapping = store.load().await;
        assert_eq!(mapping.tracks().len(), 3);
        assert_eq!(mapping.tracks()["Wolfstack Docks"], "docks.mp3");
        assert_eq!(mapping.tracks()["Spite"], "");
        assert_eq!(mapping.tracks()["Ladybones Road"], "");
        assert_eq!(mapping.settings()["Below the Map"], "below.mp3");

        assert_eq!(
            player.calls(),
            vec![PlayerCall::Load(HashSet::from(["docks.mp3".to_string()]))]
        );
    }

    #[tokio::test]
    async fn load_runs_once_and_serves_the_cached_result() {
        let resources = MemStore::new()
            .with_file(MAPPING_FILE, SAMPLE)
            .with_file("tracks/docks.mp3", "riff")
            .with_file("tracks/spite.mp3", "riff");
        let (store, player) = store_with(resources);

        let first = store.load().await.clone();
        let second = store.load().await.clone();
        assert_eq!(first, second);

        // A single preload despite two load calls.
        assert_eq!(player.calls().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_cold_loads_share_one_execution() {
        let resources = MemStore::new()
            .with_file(MAPPING_FILE, SAMPLE)
            .with_file("tracks/docks.mp3", "riff")
            .with_file("tracks/spite.mp3", "riff");
        let (store, player) = store_with(resources);
        let store = Arc::new(store);

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.load().await.clone() }
        });
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.load().await.clone() }
        });

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap(), second.unwrap());

        // Both racers awaited the same in-flight load.
        assert_eq!(player.calls().len(), 1);
    }

    #[tokio::test]
    async fn malformed_document_degrades_to_an_empty_mapping() {
        let resources = MemStore::new().with_file(MAPPING_FILE, "not json at all");
        let (store, player) = store_with(resources);

        let mapping = store.load().await;
        assert!(mapping.tracks().is_empty());
        assert!(mapping.settings().is_empty());
        assert!(mapping.areas().is_empty());

        // The player still learns about the (empty) preload set.
        assert_eq!(player.calls(), vec![PlayerCall::Load(HashSet::new())]);
    }

    #[tokio::test]
    async fn unreadable_document_degrades_to_an_empty_mapping() {
        let (store, player) = store_with(MemStore::new());

        let mapping = store.load().await;
        assert!(mapping.tracks().is_empty());
        assert_eq!(player.calls(), vec![PlayerCall::Load(HashSet::new())]);
    }

    #[tokio::test]
    async fn a_shared_missing_file_clears_every_location_that_uses_it() {
        let resources = MemStore::new()
            .with_file(
                MAPPING_FILE,
                r#"{
                    "tracks": {"Spite": "gone.mp3", "The Flit": "gone.mp3", "Veilgarden": "veil.mp3"},
                    "settings": {},
                    "areas": {}
                }"#,
            )
            .with_file("tracks/veil.mp3", "riff");
        let (store, player) = store_with(resources);

        let mapping = store.load().await;
        assert_eq!(mapping.tracks()["Spite"], "");
        assert_eq!(mapping.tracks()["The Flit"], "");
        assert_eq!(mapping.tracks()["Veilgarden"], "veil.mp3");
        assert_eq!(
            player.calls(),
            vec![PlayerCall::Load(HashSet::from(["veil.mp3".to_string()]))]
        );
    }

    #[tokio::test]
    async fn missing_tracks_skips_empty_values_and_reports_in_location_order() {
        let resources = MemStore::new();
        let document = MappingDocument::parse(SAMPLE).unwrap();

        let missing = document.missing_tracks(&resources).await;
        assert_eq!(
            missing,
            vec![
                ("Spite".to_string(), "spite.mp3".to_string()),
                ("Wolfstack Docks".to_string(), "docks.mp3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn read_document_classifies_failures() {
        let missing = read_document(&MemStore::new()).await.unwrap_err();
        assert!(matches!(missing, DocumentError::Read(_)));

        let resources = MemStore::new().with_file(MAPPING_FILE, "[]");
        let malformed = read_document(&resources).await.unwrap_err();
        assert!(matches!(malformed, DocumentError::Malformed(_)));
    }
}
