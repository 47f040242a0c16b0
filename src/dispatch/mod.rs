//! Dispatcher: the actor that owns the session.
//!
//! Every inbound observer event funnels through one unbounded channel into a
//! single task that owns the session, the registry and the mapping store.
//! Events are processed strictly in arrival order, which keeps the session's
//! decisions deterministic without any locking.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use crate::mapping::MappingStore;
use crate::protocol::{Location, ObserverId};
use crate::registry::SubscriberRegistry;
use crate::session::Session;

/// Events the dispatcher handles.
///
/// Most are fire-and-forget. `Setting` carries an optional ack channel so a
/// transport can hold further reads from its observer until the report is
/// actually recorded.
#[derive(Debug)]
pub enum ObserverEvent {
    /// Observer handshake: attach `from` and bring it up to date.
    Hello { from: ObserverId },

    /// Flip the shared mute state.
    ToggleMute,

    /// The coarse-grained region changed.
    Setting {
        setting: String,
        /// Signalled once the setting is stored.
        ack: Option<oneshot::Sender<()>>,
    },

    /// The fine-grained place changed.
    Location { location: Location },

    /// The observer's connection went away (the observer itself said
    /// nothing; the transport noticed).
    Disconnected { id: ObserverId },
}

/// Owns the session and processes [`ObserverEvent`]s sequentially.
pub struct Dispatcher {
    session: Session,
    registry: SubscriberRegistry,
    mapping: Arc<MappingStore>,
    events_rx: mpsc::UnboundedReceiver<ObserverEvent>,
}

impl Dispatcher {
    /// Spawn the dispatcher task and return a handle for feeding it.
    pub fn spawn(
        session: Session,
        registry: SubscriberRegistry,
        mapping: Arc<MappingStore>,
    ) -> DispatcherHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher {
            session,
            registry,
            mapping,
            events_rx,
        };
        tokio::spawn(dispatcher.run());

        info!("Dispatcher spawned");
        DispatcherHandle::new(events_tx)
    }

    /// Main run loop. Ends when every handle is dropped.
    async fn run(mut self) {
        debug!("Dispatcher run loop started");

        // Adopt observers that connected before we started listening, then
        // warm up the mapping so the first handshake gets it right away.
        self.registry.seed_from_host().await;
        self.mapping.load().await;

        while let Some(event) = self.events_rx.recv().await {
            trace!(?event, "Processing event");
            self.handle(event).await;
        }

        debug!("Dispatcher run loop ended");
    }

    async fn handle(&mut self, event: ObserverEvent) {
        match event {
            ObserverEvent::Hello { from } => {
                self.registry.attach(from, self.session.muted()).await;
            }
            ObserverEvent::ToggleMute => {
                self.session.toggle_mute(&self.registry).await;
            }
            ObserverEvent::Setting { setting, ack } => {
                self.session.set_setting(setting);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            ObserverEvent::Location { location } => {
                self.session
                    .set_location(location, &self.mapping, &self.registry)
                    .await;
            }
            ObserverEvent::Disconnected { id } => {
                if self.registry.detach(id) {
                    info!("Last observer detached, muting the session");
                    self.session.force_mute(&self.registry).await;
                }
            }
        }
    }
}

/// Cloneable handle for sending events to the dispatcher.
///
/// All methods are non-blocking for the caller except [`set_setting`], which
/// waits for the dispatcher's ack.
///
/// [`set_setting`]: DispatcherHandle::set_setting
#[derive(Clone)]
pub struct DispatcherHandle {
    events_tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl DispatcherHandle {
    pub fn new(events_tx: mpsc::UnboundedSender<ObserverEvent>) -> Self {
        Self { events_tx }
    }

    /// Attach an observer and bring it up to date. Fire-and-forget.
    pub fn hello(&self, from: ObserverId) {
        let _ = self.events_tx.send(ObserverEvent::Hello { from });
    }

    /// Flip the shared mute state. Fire-and-forget.
    pub fn toggle_mute(&self) {
        let _ = self.events_tx.send(ObserverEvent::ToggleMute);
    }

    /// Record a setting report and wait until the dispatcher stored it.
    pub async fn set_setting(&self, setting: String) {
        let (ack_tx, ack_rx) = oneshot::channel();
        let event = ObserverEvent::Setting {
            setting,
            ack: Some(ack_tx),
        };
        if self.events_tx.send(event).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    /// Record a location report. Fire-and-forget.
    pub fn set_location(&self, location: Location) {
        let _ = self.events_tx.send(ObserverEvent::Location { location });
    }

    /// Tell the dispatcher a connection went away.
    pub fn observer_disconnected(&self, id: ObserverId) {
        let _ = self.events_tx.send(ObserverEvent::Disconnected { id });
    }

    /// False once the dispatcher task is gone.
    pub fn is_alive(&self) -> bool {
        !self.events_tx.is_closed()
    }
}
