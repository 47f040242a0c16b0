//! Playback engine seam and the console stand-in used for development.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Audio engine driven by the session.
///
/// The gateway never touches audio buffers itself; it only tells the engine
/// which files matter and which one should run. Implementations must
/// tolerate repeated calls (`stop` while stopped, `mute` while muted).
#[async_trait]
pub trait TrackPlayer: Send + Sync {
    /// Announce the verified track files so the engine can preload them.
    async fn load_tracks(&self, tracks: HashSet<String>) -> Result<()>;

    /// Start (or restart) playback of one track file.
    async fn play_track(&self, track: &str) -> Result<()>;

    /// Stop playback entirely.
    async fn stop(&self) -> Result<()>;

    /// Silence output without losing the playback position.
    async fn mute(&self) -> Result<()>;

    /// Restore output after a mute.
    async fn unmute(&self) -> Result<()>;
}

/// TrackPlayer that logs every command instead of producing audio.
///
/// This is useful for:
/// - Running the gateway without an audio backend attached
/// - Watching session decisions in the log while tuning a mapping file
/// - Tests that only care about command ordering
pub struct ConsolePlayer {
    /// Number of commands received (for potential testing/assertions)
    command_count: RwLock<u64>,
}

impl ConsolePlayer {
    pub fn new() -> Self {
        Self {
            command_count: RwLock::new(0),
        }
    }

    async fn bump(&self) -> u64 {
        let mut count = self.command_count.write().await;
        *count += 1;
        *count
    }

    fn timestamp() -> String {
        chrono::Local::now().format("%H:%M:%S%.3f").to_string()
    }
}

impl Default for ConsolePlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackPlayer for ConsolePlayer {
    async fn load_tracks(&self, tracks: HashSet<String>) -> Result<()> {
        let num = self.bump().await;
        info!(
            "🎵 [{}] Player preloading {} track(s) [cmd #{}]",
            Self::timestamp(),
            tracks.len(),
            num
        );

        let mut names: Vec<&str> = tracks.iter().map(String::as_str).collect();
        names.sort_unstable();
        debug!(tracks = ?names, "ConsolePlayer preload set");
        Ok(())
    }

    async fn play_track(&self, track: &str) -> Result<()> {
        let num = self.bump().await;
        info!("🎵 [{}] Playing track {} [cmd #{}]", Self::timestamp(), track, num);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let num = self.bump().await;
        info!("⏹️  [{}] Playback stopped [cmd #{}]", Self::timestamp(), num);
        Ok(())
    }

    async fn mute(&self) -> Result<()> {
        let num = self.bump().await;
        info!("🔇 [{}] Player muted [cmd #{}]", Self::timestamp(), num);
        Ok(())
    }

    async fn unmute(&self) -> Result<()> {
        let num = self.bump().await;
        info!("🔊 [{}] Player unmuted [cmd #{}]", Self::timestamp(), num);
        Ok(())
    }
}
