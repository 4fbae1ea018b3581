//! [`OrderingFilter`] – per-topic monotonic guard for inbound messages.
//!
//! Each of the three inbound topics keeps a [`HeaderRecord`] of the last
//! accepted header.  A message is *outdated* when neither its header id nor
//! its timestamp advances past the record.
//!
//! | Message | Rule |
//! |---|---|
//! | state / visualization | rejected while offline or outdated |
//! | connection `CONNECTIONBROKEN` | always accepted, full reset, offline |
//! | connection `ONLINE` / `OFFLINE` | accepted even when outdated, resets the other records |
//!
//! Outdated `ONLINE`/`OFFLINE` messages are still accepted: a rebooted vehicle
//! restarts its header sequence, and rejecting it would block every later
//! message for good.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use vdalink_middleware::ordering_filter::OrderingFilter;
//! use vdalink_types::{Connection, ConnectionState, Header, InboundMessage, State};
//!
//! let mut filter = OrderingFilter::new();
//! let state = InboundMessage::State(State::new(Header::new(1, Utc::now())));
//! assert!(!filter.accept(&state), "offline until the vehicle reports ONLINE");
//!
//! let online = InboundMessage::Connection(Connection {
//!     header: Header::new(1, Utc::now()),
//!     connection_state: ConnectionState::Online,
//! });
//! assert!(filter.accept(&online));
//! assert!(filter.accept(&state));
//! assert!(!filter.accept(&state), "replays are dropped");
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use vdalink_types::{Connection, ConnectionState, Header, InboundMessage, MessageTopic};

/// Last accepted header of one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub header_id: u32,
    pub timestamp: DateTime<Utc>,
}

impl Default for HeaderRecord {
    fn default() -> Self {
        Self {
            header_id: 0,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl HeaderRecord {
    /// `true` when `header` advances neither the id nor the timestamp.
    pub fn is_outdated(&self, header: &Header) -> bool {
        header.header_id <= self.header_id && header.timestamp <= self.timestamp
    }

    fn update(&mut self, header: &Header) {
        self.header_id = header.header_id;
        self.timestamp = header.timestamp;
    }
}

#[derive(Debug)]
pub struct OrderingFilter {
    connection: HeaderRecord,
    state: HeaderRecord,
    visualization: HeaderRecord,
    offline: bool,
}

impl Default for OrderingFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderingFilter {
    /// A filter that considers the vehicle offline until it reports ONLINE.
    pub fn new() -> Self {
        Self {
            connection: HeaderRecord::default(),
            state: HeaderRecord::default(),
            visualization: HeaderRecord::default(),
            offline: true,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn record(&self, topic: MessageTopic) -> &HeaderRecord {
        match topic {
            MessageTopic::Connection => &self.connection,
            MessageTopic::State => &self.state,
            MessageTopic::Visualization => &self.visualization,
        }
    }

    /// Decide whether `message` is processed.  Accepted messages update the
    /// topic's record.
    pub fn accept(&mut self, message: &InboundMessage) -> bool {
        match message {
            InboundMessage::Connection(connection) => self.accept_connection(connection),
            InboundMessage::State(state) => self.accept_ordered(MessageTopic::State, &state.header),
            InboundMessage::Visualization(visualization) => {
                self.accept_ordered(MessageTopic::Visualization, &visualization.header)
            }
        }
    }

    /// The broker connection itself was lost.
    pub fn on_broker_offline(&mut self) {
        info!("broker offline, resetting header records");
        self.reset();
    }

    fn accept_ordered(&mut self, topic: MessageTopic, header: &Header) -> bool {
        if self.offline {
            debug!(%topic, header_id = header.header_id, "dropped while vehicle is offline");
            return false;
        }
        let record = self.record_mut(topic);
        if record.is_outdated(header) {
            debug!(
                %topic,
                header_id = header.header_id,
                last_header_id = record.header_id,
                "dropped outdated message"
            );
            return false;
        }
        record.update(header);
        true
    }

    fn accept_connection(&mut self, connection: &Connection) -> bool {
        let header = &connection.header;
        match connection.connection_state {
            ConnectionState::ConnectionBroken => {
                info!(header_id = header.header_id, "vehicle connection broken");
                self.reset();
            }
            state @ (ConnectionState::Online | ConnectionState::Offline) => {
                if self.connection.is_outdated(header) {
                    warn!(
                        header_id = header.header_id,
                        last_header_id = self.connection.header_id,
                        ?state,
                        "outdated connection message accepted, assuming vehicle restart"
                    );
                }
                self.state = HeaderRecord::default();
                self.visualization = HeaderRecord::default();
                self.connection.update(header);
                self.offline = state == ConnectionState::Offline;
                info!(?state, offline = self.offline, "vehicle connection state changed");
            }
        }
        true
    }

    fn reset(&mut self) {
        self.connection = HeaderRecord::default();
        self.state = HeaderRecord::default();
        self.visualization = HeaderRecord::default();
        self.offline = true;
    }

    fn record_mut(&mut self, topic: MessageTopic) -> &mut HeaderRecord {
        match topic {
            MessageTopic::Connection => &mut self.connection,
            MessageTopic::State => &mut self.state,
            MessageTopic::Visualization => &mut self.visualization,
        }
    }
}
