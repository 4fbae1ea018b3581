//! `vdalink-middleware` – the vehicle-facing protocol state machines.
//!
//! Everything here runs on the vehicle's single executor.  No component
//! locks, blocks, or performs I/O; outbound traffic goes through a
//! [`MessageSink`], command reports through a [`CommandReporter`] and
//! telemetry through the [`VehicleEventBus`].
//!
//! # Modules
//!
//! - [`ordering_filter`] – per-topic header-id / timestamp guard with the
//!   online/offline gate and reconnect reset.
//! - [`request_matcher`] – single in-flight request queue matched against
//!   state-report acknowledgments, with rejection detection.
//! - [`completion_tracker`] – decides when acknowledged orders have been
//!   physically driven.
//! - [`adapter`] – the [`MessageSink`] outbound trait and [`ChannelSink`].
//! - [`bus`] – [`VehicleEvent`]s on a Tokio broadcast channel.
//! - [`reports`] – lossless [`CommandReport`]s for the upstream scheduler.

pub mod adapter;
pub mod bus;
pub mod completion_tracker;
pub mod ordering_filter;
pub mod reports;
pub mod request_matcher;

pub use adapter::{ChannelSink, MessageSink, OutboundMessage};
pub use bus::{VehicleEvent, VehicleEventBus, VehicleEventReceiver, VehicleStatus};
pub use completion_tracker::{CompletionMode, CompletionTracker};
pub use ordering_filter::{HeaderRecord, OrderingFilter};
pub use reports::{CommandReport, CommandReporter};
pub use request_matcher::{OrderAssociation, Request, RequestListener, RequestMatcher};
