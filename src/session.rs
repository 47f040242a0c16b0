//! Mutable state of the one listening session.
//!
//! A session tracks the latest reports (setting, location), what the player
//! is doing (current track, mute) and pushes every externally visible change
//! to the observers and the status indicator. Only the dispatcher task calls
//! into it, so the struct needs no internal locking.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::mapping::MappingStore;
use crate::player::TrackPlayer;
use crate::protocol::{Location, OutboundMessage};
use crate::registry::SubscriberRegistry;
use crate::resolver::{self, NotFound};
use crate::status::{StatusIndicator, StatusView};

pub struct Session {
    /// Latest reported setting, if any observer sent one yet.
    setting: Option<String>,
    /// Latest reported location, including the unknown sentinel.
    location: Option<Location>,
    /// File most recently handed to the player; empty while stopped.
    current_track: String,
    muted: bool,
    player: Arc<dyn TrackPlayer>,
    status: Arc<dyn StatusIndicator>,
}

impl Session {
    pub fn new(player: Arc<dyn TrackPlayer>, status: Arc<dyn StatusIndicator>) -> Self {
        Self {
            setting: None,
            location: None,
            current_track: String::new(),
            muted: false,
            player,
            status,
        }
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn current_track(&self) -> &str {
        &self.current_track
    }

    /// Record a new setting. Resolution waits for the next location report.
    pub fn set_setting(&mut self, setting: String) {
        debug!("Setting is now \"{setting}\"");
        self.setting = Some(setting);
        self.refresh_status();
    }

    /// Record a new location and, when it names a place, resolve and apply
    /// the matching track.
    pub async fn set_location(
        &mut self,
        location: Location,
        mapping: &MappingStore,
        registry: &SubscriberRegistry,
    ) {
        self.location = Some(location.clone());
        self.refresh_status();

        let Location::Named(name) = location else {
            debug!("Location is unknown, leaving playback untouched");
            return;
        };

        let mapping = mapping.load().await;
        match resolver::resolve_track(mapping, self.setting.as_deref(), &name) {
            Ok(track) => {
                let track = track.to_string();
                registry
                    .broadcast(&OutboundMessage::Track {
                        track: Some(track.clone()),
                    })
                    .await;

                if track == self.current_track {
                    debug!("Track {track} is already playing");
                    return;
                }

                info!("Playing track {track}");
                if let Err(err) = self.player.play_track(&track).await {
                    warn!("Player failed to start {track}: {err:#}");
                }
                self.current_track = track;
            }
            Err(NotFound) => {
                debug!("No track mapped for \"{name}\", stopping playback");
                if let Err(err) = self.player.stop().await {
                    warn!("Player failed to stop: {err:#}");
                }
                self.current_track.clear();
                registry.broadcast(&OutboundMessage::Track { track: None }).await;
            }
        }
    }

    /// Flip the mute state and tell everyone about it.
    pub async fn toggle_mute(&mut self, registry: &SubscriberRegistry) {
        self.muted = !self.muted;
        if self.muted {
            info!("🔇 Session muted");
        } else {
            info!("🔊 Session unmuted");
        }

        self.apply_mute().await;
        self.refresh_status();
        registry
            .broadcast(&OutboundMessage::MuteStatus {
                is_muted: self.muted,
            })
            .await;
    }

    /// Mute no matter the prior state, used when the last observer goes away.
    pub async fn force_mute(&mut self, registry: &SubscriberRegistry) {
        debug!("Session force-muted");
        self.muted = true;
        self.apply_mute().await;
        self.refresh_status();
        registry
            .broadcast(&OutboundMessage::MuteStatus { is_muted: true })
            .await;
    }

    async fn apply_mute(&self) {
        let result = if self.muted {
            self.player.mute().await
        } else {
            self.player.unmute().await
        };
        if let Err(err) = result {
            warn!("Player mute change failed: {err:#}");
        }
    }

    fn refresh_status(&self) {
        let view = StatusView::compose(self.muted, self.setting.as_deref(), self.location.as_ref());
        self.status.update(&view);
    }
}
