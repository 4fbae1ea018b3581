//! `vdalink-mapping` – from plant-model movement steps to VDA5050 orders.
//!
//! Everything in this crate is synchronous and side-effect free apart from
//! logging; the only state is owned explicitly by [`OrderMapper`].
//!
//! # Modules
//!
//! - [`properties`] – the `vda5050:*` property keys and typed readers for
//!   plant-model property maps.
//! - [`actions`] – extraction of [`PropertyAction`][actions::PropertyAction]s
//!   from property maps, plus destination ("do X here") action resolution.
//! - [`action_filter`] – [`ActionFilter`][action_filter::ActionFilter]: an
//!   ordered list of [`ActionRule`][action_filter::ActionRule]s (vehicle
//!   capability, tags, node/edge scope, lifecycle trigger) that must all
//!   accept a candidate action.
//! - [`node_edge`] – [`ElementMapper`][node_edge::ElementMapper]: converts
//!   points and route steps into protocol nodes and edges, including allowed
//!   deviation.
//! - [`order_mapper`] – [`OrderMapper`][order_mapper::OrderMapper]: builds
//!   one order (base + horizon) per movement command and stitches
//!   consecutive commands of the same drive order together.
//! - [`position_resolver`] – [`PositionResolver`][position_resolver::PositionResolver]:
//!   derives the discrete point name from a state report.

pub mod action_filter;
pub mod actions;
pub mod node_edge;
pub mod order_mapper;
pub mod position_resolver;
pub mod properties;

pub use action_filter::{ActionFilter, ActionRule};
pub use actions::{ActionIdCounter, ActionScope, ActionTrigger, PropertyAction};
pub use node_edge::{DeviationMode, ElementMapper};
pub use order_mapper::{MapperConfig, OrderMapper};
pub use position_resolver::{PositionResolver, ResolverConfig};
