//! [`VehicleExecutor`] – the single logical executor of one vehicle.
//!
//! The controller's components take no locks, so every mutation has to
//! happen on one task.  The executor owns the [`VehicleController`] and
//! processes [`ExecutorInput`]s strictly in arrival order.  Transports,
//! upstream schedulers and operators talk to it through a cloneable
//! [`ExecutorHandle`].
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo(controller: vdalink_runtime::VehicleController) -> Result<(), vdalink_types::VdaError> {
//! use vdalink_runtime::executor::VehicleExecutor;
//! use vdalink_types::{BlockingType, InstantActions};
//!
//! let (task, handle) = VehicleExecutor::spawn(controller, 64);
//! handle
//!     .send_instant_actions(InstantActions::single("startPause", BlockingType::Hard))
//!     .await?;
//! handle.shutdown().await?;
//! let _controller = task.await.map_err(|e| vdalink_types::VdaError::Channel(e.to_string()))?;
//! # Ok(())
//! # }
//! ```

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vdalink_types::{InboundMessage, InstantActions, MovementCommand, VdaError};

use crate::controller::VehicleController;

/// Work items processed by the executor.
#[derive(Debug)]
pub enum ExecutorInput {
    Message(InboundMessage),
    Command(Box<MovementCommand>),
    InstantActions(InstantActions),
    ClearQueues,
    BrokerOffline,
    Shutdown,
}

/// Cloneable sender side of a [`VehicleExecutor`].
#[derive(Clone, Debug)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<ExecutorInput>,
}

impl ExecutorHandle {
    pub async fn submit(&self, input: ExecutorInput) -> Result<(), VdaError> {
        self.tx
            .send(input)
            .await
            .map_err(|_| VdaError::ExecutorClosed)
    }

    /// Submit from a non-async transport thread.  Must not be called from
    /// within the Tokio runtime.
    pub fn blocking_submit(&self, input: ExecutorInput) -> Result<(), VdaError> {
        self.tx
            .blocking_send(input)
            .map_err(|_| VdaError::ExecutorClosed)
    }

    pub async fn deliver(&self, message: InboundMessage) -> Result<(), VdaError> {
        self.submit(ExecutorInput::Message(message)).await
    }

    pub async fn enqueue_command(&self, command: MovementCommand) -> Result<(), VdaError> {
        self.submit(ExecutorInput::Command(Box::new(command))).await
    }

    pub async fn send_instant_actions(&self, actions: InstantActions) -> Result<(), VdaError> {
        self.submit(ExecutorInput::InstantActions(actions)).await
    }

    pub async fn clear_queues(&self) -> Result<(), VdaError> {
        self.submit(ExecutorInput::ClearQueues).await
    }

    pub async fn broker_offline(&self) -> Result<(), VdaError> {
        self.submit(ExecutorInput::BrokerOffline).await
    }

    pub async fn shutdown(&self) -> Result<(), VdaError> {
        self.submit(ExecutorInput::Shutdown).await
    }
}

pub struct VehicleExecutor {
    controller: VehicleController,
    rx: mpsc::Receiver<ExecutorInput>,
}

impl VehicleExecutor {
    /// Wrap `controller`; `capacity` bounds the input channel.
    pub fn new(controller: VehicleController, capacity: usize) -> (Self, ExecutorHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { controller, rx }, ExecutorHandle { tx })
    }

    /// Spawn the executor on the current Tokio runtime.  The task yields the
    /// controller back once it stops.
    pub fn spawn(
        controller: VehicleController,
        capacity: usize,
    ) -> (JoinHandle<VehicleController>, ExecutorHandle) {
        let (executor, handle) = Self::new(controller, capacity);
        (tokio::spawn(executor.run()), handle)
    }

    /// Process inputs until [`ExecutorInput::Shutdown`] arrives or every
    /// handle is dropped.
    pub async fn run(mut self) -> VehicleController {
        info!(vehicle = %self.controller.vehicle().name, "vehicle executor started");
        while let Some(input) = self.rx.recv().await {
            match input {
                ExecutorInput::Message(message) => {
                    self.controller.handle_message(&message);
                }
                ExecutorInput::Command(command) => self.controller.enqueue_command(*command),
                ExecutorInput::InstantActions(actions) => {
                    self.controller.send_instant_actions(actions)
                }
                ExecutorInput::ClearQueues => self.controller.clear_queues(),
                ExecutorInput::BrokerOffline => self.controller.on_broker_offline(),
                ExecutorInput::Shutdown => {
                    debug!("shutdown requested");
                    break;
                }
            }
        }
        info!(vehicle = %self.controller.vehicle().name, "vehicle executor stopped");
        self.controller
    }
}
