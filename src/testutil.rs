//! In-memory fakes shared by the unit tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::player::TrackPlayer;
use crate::protocol::{ObserverId, OutboundMessage};
use crate::registry::ObserverMessenger;
use crate::resources::ResourceStore;

/// One recorded call on [`FakePlayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    Load(HashSet<String>),
    Play(String),
    Stop,
    Mute,
    Unmute,
}

/// TrackPlayer that records every call in order.
#[derive(Default)]
pub struct FakePlayer {
    calls: Mutex<Vec<PlayerCall>>,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TrackPlayer for FakePlayer {
    async fn load_tracks(&self, tracks: HashSet<String>) -> Result<()> {
        self.calls.lock().push(PlayerCall::Load(tracks));
        Ok(())
    }

    async fn play_track(&self, track: &str) -> Result<()> {
        self.calls.lock().push(PlayerCall::Play(track.to_string()));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.calls.lock().push(PlayerCall::Stop);
        Ok(())
    }

    async fn mute(&self) -> Result<()> {
        self.calls.lock().push(PlayerCall::Mute);
        Ok(())
    }

    async fn unmute(&self) -> Result<()> {
        self.calls.lock().push(PlayerCall::Unmute);
        Ok(())
    }
}

/// ObserverMessenger that records deliveries and mirrors them onto a channel
/// so tests can await messages sent from spawned tasks.
pub struct FakeMessenger {
    sent: Mutex<Vec<(ObserverId, OutboundMessage)>>,
    notify: mpsc::UnboundedSender<(ObserverId, OutboundMessage)>,
    failing: Mutex<BTreeSet<ObserverId>>,
    present: Mutex<Vec<ObserverId>>,
}

impl FakeMessenger {
    pub fn new() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<(ObserverId, OutboundMessage)>,
    ) {
        let (notify, rx) = mpsc::unbounded_channel();
        let messenger = Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            notify,
            failing: Mutex::new(BTreeSet::new()),
            present: Mutex::new(Vec::new()),
        });
        (messenger, rx)
    }

    /// Everything delivered so far, in delivery order.
    pub fn sent(&self) -> Vec<(ObserverId, OutboundMessage)> {
        self.sent.lock().clone()
    }

    /// Make every future send to `id` fail.
    pub fn fail_sends_to(&self, id: ObserverId) {
        self.failing.lock().insert(id);
    }

    /// Set what `enumerate` reports.
    pub fn set_present(&self, ids: Vec<ObserverId>) {
        *self.present.lock() = ids;
    }
}

#[async_trait]
impl ObserverMessenger for FakeMessenger {
    async fn send(&self, to: ObserverId, message: &OutboundMessage) -> Result<()> {
        if self.failing.lock().contains(&to) {
            bail!("observer {to} is unreachable");
        }
        self.sent.lock().push((to, message.clone()));
        let _ = self.notify.send((to, message.clone()));
        Ok(())
    }

    async fn enumerate(&self) -> Vec<ObserverId> {
        self.present.lock().clone()
    }
}

/// ResourceStore backed by a map of path to contents.
#[derive(Default)]
pub struct MemStore {
    files: HashMap<String, String>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(path.to_string(), contents.to_string());
        self
    }
}

#[async_trait]
impl ResourceStore for MemStore {
    async fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        match self.files.get(path) {
            Some(contents) => Ok(contents.clone()),
            None => bail!("no such resource: {path}"),
        }
    }
}
