//! `vdalink-runtime` – runs the protocol core for one vehicle.
//!
//! # Modules
//!
//! - [`controller`] – [`VehicleController`][controller::VehicleController]:
//!   wires the order mapper, ordering filter, request matcher, completion
//!   tracker and position resolver together and reports upward through the
//!   [`VehicleEventBus`][vdalink_middleware::VehicleEventBus].
//! - [`executor`] – [`VehicleExecutor`][executor::VehicleExecutor]: a Tokio
//!   task that owns the controller and processes inbound messages and
//!   commands strictly in order.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber with optional OTLP span export.

pub mod controller;
pub mod executor;
pub mod telemetry;

pub use controller::{ControllerConfig, VehicleController, derive_status};
pub use executor::{ExecutorHandle, ExecutorInput, VehicleExecutor};
pub use telemetry::{TracerProviderGuard, init_tracing};
