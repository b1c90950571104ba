//! Minimal in-memory channel registry.
//!
//! Channels track session membership and record sent payloads in an outbox.
//! Nothing is delivered anywhere; tests inspect [`Channel::sent`] instead.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    fmt,
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Opaque client session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Delivery guarantee requested for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delivery {
    /// No ordering or delivery guarantee
    Unreliable,
    /// Delivered, in any order
    UnorderedReliable,
    /// In order, possibly with gaps
    OrderedUnreliable,
    /// Delivered in order
    Reliable,
}

/// A payload recorded by [`Channel::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Sending session, or `None` when the server sent it
    pub sender: Option<SessionId>,
    /// Raw payload
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct ChannelState {
    name: String,
    delivery: Delivery,
    sessions: BTreeSet<SessionId>,
    outbox: Vec<SentMessage>,
}

/// Named channel. Cheap to clone; clones share membership and outbox.
#[derive(Clone)]
pub struct Channel {
    state: Rc<RefCell<ChannelState>>,
}

impl Channel {
    fn new(name: &str, delivery: Delivery) -> Self {
        Self {
            state: Rc::new(RefCell::new(ChannelState {
                name: name.to_string(),
                delivery,
                sessions: BTreeSet::new(),
                outbox: Vec::new(),
            })),
        }
    }

    /// Channel name.
    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    /// Delivery guarantee the channel was created with.
    pub fn delivery(&self) -> Delivery {
        self.state.borrow().delivery
    }

    /// Add `session` to the channel. Joining twice is a no-op.
    pub fn join(&self, session: SessionId) -> &Self {
        self.state.borrow_mut().sessions.insert(session);
        self
    }

    /// Add every session in `sessions`.
    pub fn join_all(&self, sessions: impl IntoIterator<Item = SessionId>) -> &Self {
        self.state.borrow_mut().sessions.extend(sessions);
        self
    }

    /// Remove `session` from the channel. Leaving when absent is a no-op.
    pub fn leave(&self, session: SessionId) -> &Self {
        self.state.borrow_mut().sessions.remove(&session);
        self
    }

    /// Remove every session.
    pub fn leave_all(&self) -> &Self {
        self.state.borrow_mut().sessions.clear();
        self
    }

    /// Member sessions, ascending.
    pub fn sessions(&self) -> Vec<SessionId> {
        self.state.borrow().sessions.iter().copied().collect()
    }

    /// True if at least one session is a member.
    pub fn has_sessions(&self) -> bool {
        !self.state.borrow().sessions.is_empty()
    }

    /// Record `payload` in the outbox.
    pub fn send(&self, sender: Option<SessionId>, payload: impl Into<Vec<u8>>) -> &Self {
        let payload = payload.into();
        {
            let mut state = self.state.borrow_mut();
            tracing::debug!(
                channel = %state.name,
                bytes = payload.len(),
                recipients = state.sessions.len(),
                "Recorded channel message"
            );
            state.outbox.push(SentMessage { sender, payload });
        }
        self
    }

    /// Everything sent so far, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.borrow().outbox.clone()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Channel")
            .field("name", &state.name)
            .field("delivery", &state.delivery)
            .field("sessions", &state.sessions.len())
            .finish_non_exhaustive()
    }
}

/// Registry of channels by name.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Rc<RefCell<BTreeMap<String, Channel>>>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel named `name`.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NameExists`] if a channel with that name exists.
    pub fn create_channel(&self, name: &str, delivery: Delivery) -> Result<Channel, ChannelError> {
        let mut channels = self.channels.borrow_mut();
        if channels.contains_key(name) {
            return Err(ChannelError::NameExists(name.to_string()));
        }

        let channel = Channel::new(name, delivery);
        channels.insert(name.to_string(), channel.clone());
        tracing::debug!(channel = name, ?delivery, "Created channel");
        Ok(channel)
    }

    /// Channel named `name`.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotBound`] if no such channel exists.
    pub fn get_channel(&self, name: &str) -> Result<Channel, ChannelError> {
        self.channels
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| ChannelError::NotBound(name.to_string()))
    }

    /// Every channel, by name.
    pub fn channels(&self) -> BTreeMap<String, Channel> {
        self.channels.borrow().clone()
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.borrow().len()
    }

    /// True if no channels exist.
    pub fn is_empty(&self) -> bool {
        self.channels.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = ChannelRegistry::new();
        registry.create_channel("lobby", Delivery::Reliable).unwrap();

        let err = registry.create_channel("lobby", Delivery::Unreliable).unwrap_err();
        assert_eq!(err, ChannelError::NameExists("lobby".to_string()));
        assert_eq!(registry.get_channel("lobby").unwrap().delivery(), Delivery::Reliable);
    }

    #[test]
    fn missing_channel_is_not_bound() {
        let registry = ChannelRegistry::new();
        assert_eq!(
            registry.get_channel("nowhere").unwrap_err(),
            ChannelError::NotBound("nowhere".to_string())
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn membership_is_shared_between_handles() {
        let registry = ChannelRegistry::new();
        let channel = registry.create_channel("party", Delivery::OrderedUnreliable).unwrap();

        channel.join(SessionId(2)).join(SessionId(1)).join(SessionId(2));
        let fetched = registry.get_channel("party").unwrap();
        assert_eq!(fetched.sessions(), vec![SessionId(1), SessionId(2)]);

        fetched.leave(SessionId(1));
        assert_eq!(channel.sessions(), vec![SessionId(2)]);

        channel.leave_all();
        assert!(!fetched.has_sessions());
    }

    #[test]
    fn join_all_adds_every_session() {
        let channel = ChannelRegistry::new().create_channel("raid", Delivery::Reliable).unwrap();
        channel.join_all((0..4).map(SessionId));
        assert_eq!(channel.sessions().len(), 4);
    }

    #[test]
    fn sends_are_recorded_in_order() {
        let registry = ChannelRegistry::new();
        let channel = registry.create_channel("chat", Delivery::UnorderedReliable).unwrap();

        channel.send(Some(SessionId(7)), b"hello".to_vec()).send(None, "welcome");

        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], SentMessage { sender: Some(SessionId(7)), payload: b"hello".to_vec() });
        assert_eq!(sent[1].payload, b"welcome".to_vec());
        assert_eq!(registry.channels().len(), 1);
    }
}
