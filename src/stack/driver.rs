//! Async driver. One tokio task owns a [`MessageDispatcher`], so every event for a node is handled
//! in arrival order without locks. Timers are served by sleeping until
//! [`MessageDispatcher::next_deadline`].
use crate::address::UnicastAddress;
use crate::interface::{EventSink, MeshEvent, OutboundTransport};
use crate::models::Operation;
use crate::stack::dispatcher::{DispatchError, MessageDispatcher};
use crate::stack::NodeIdentity;
use tokio::sync::{mpsc, oneshot};
use tokio::time;

pub const COMMAND_CHANNEL_SIZE: usize = 16;

#[derive(Debug)]
pub enum DriverCommand {
    AddNode(NodeIdentity),
    Send {
        node: UnicastAddress,
        operation: Operation,
        reply: oneshot::Sender<Result<(), DispatchError>>,
    },
    Notification {
        node: UnicastAddress,
        bytes: Vec<u8>,
    },
    WriteComplete {
        node: UnicastAddress,
        bytes: Vec<u8>,
    },
    Disconnect(UnicastAddress),
    Shutdown,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, thiserror::Error)]
pub enum DriverError {
    #[error("driver task stopped")]
    Closed,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
impl<T> From<mpsc::error::SendError<T>> for DriverError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        DriverError::Closed
    }
}

/// Forwards events to a channel, for applications that consume them from another task.
impl EventSink for mpsc::UnboundedSender<MeshEvent> {
    fn on_event(&mut self, event: MeshEvent) {
        // A closed receiver means nobody is listening anymore.
        let _ = self.send(event);
    }
}

/// Cheap to clone handle for feeding a running [`Driver`].
#[derive(Clone, Debug)]
pub struct DriverHandle {
    tx: mpsc::Sender<DriverCommand>,
}
impl DriverHandle {
    /// # Errors
    /// `Closed` if the driver stopped.
    pub async fn add_node(&self, identity: NodeIdentity) -> Result<(), DriverError> {
        Ok(self.tx.send(DriverCommand::AddNode(identity)).await?)
    }
    /// Starts `operation` on `node` and waits until its PDUs are written.
    /// # Errors
    /// `Closed` if the driver stopped, otherwise whatever [`MessageDispatcher::send`] reports.
    pub async fn send(&self, node: UnicastAddress, operation: Operation) -> Result<(), DriverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DriverCommand::Send {
                node,
                operation,
                reply,
            })
            .await?;
        Ok(rx.await.map_err(|_| DriverError::Closed)??)
    }
    /// # Errors
    /// `Closed` if the driver stopped.
    pub async fn notification(&self, node: UnicastAddress, bytes: Vec<u8>) -> Result<(), DriverError> {
        Ok(self
            .tx
            .send(DriverCommand::Notification { node, bytes })
            .await?)
    }
    /// # Errors
    /// `Closed` if the driver stopped.
    pub async fn write_complete(&self, node: UnicastAddress, bytes: Vec<u8>) -> Result<(), DriverError> {
        Ok(self
            .tx
            .send(DriverCommand::WriteComplete { node, bytes })
            .await?)
    }
    /// # Errors
    /// `Closed` if the driver stopped.
    pub async fn disconnect(&self, node: UnicastAddress) -> Result<(), DriverError> {
        Ok(self.tx.send(DriverCommand::Disconnect(node)).await?)
    }
    /// # Errors
    /// `Closed` if the driver already stopped.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        Ok(self.tx.send(DriverCommand::Shutdown).await?)
    }
}

pub struct Driver<T: OutboundTransport, E: EventSink> {
    logger: slog::Logger,
    dispatcher: MessageDispatcher<T, E>,
    rx: mpsc::Receiver<DriverCommand>,
}
impl<T: OutboundTransport, E: EventSink> Driver<T, E> {
    #[must_use]
    pub fn new(
        logger: impl Into<Option<slog::Logger>>,
        dispatcher: MessageDispatcher<T, E>,
        channel_size: usize,
    ) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::channel(channel_size);
        (
            Self {
                logger: logger.into().unwrap_or_else(crate::discard_logger),
                dispatcher,
                rx,
            },
            DriverHandle { tx },
        )
    }
    fn now() -> std::time::Instant {
        time::Instant::now().into_std()
    }
    /// Runs until `Shutdown` or until every handle is dropped. Returns the dispatcher.
    pub async fn run(mut self) -> MessageDispatcher<T, E> {
        debug!(self.logger, "driver started");
        loop {
            let command = match self.dispatcher.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        command = self.rx.recv() => command,
                        _ = time::sleep_until(time::Instant::from_std(deadline)) => {
                            if let Err(e) = self.dispatcher.poll(Self::now()) {
                                warn!(self.logger, "timer handling failed"; "error" => %e);
                            }
                            continue;
                        }
                    }
                }
                None => self.rx.recv().await,
            };
            match command {
                None | Some(DriverCommand::Shutdown) => break,
                Some(command) => self.handle(command),
            }
        }
        debug!(self.logger, "driver stopped");
        self.dispatcher
    }
    fn handle(&mut self, command: DriverCommand) {
        let now = Self::now();
        let result = match command {
            DriverCommand::AddNode(identity) => {
                self.dispatcher.add_node(identity);
                Ok(())
            }
            DriverCommand::Send {
                node,
                operation,
                reply,
            } => {
                // The caller may have stopped waiting.
                let _ = reply.send(self.dispatcher.send(node, operation, now));
                Ok(())
            }
            DriverCommand::Notification { node, bytes } => {
                self.dispatcher.on_notification(node, &bytes, now)
            }
            DriverCommand::WriteComplete { node, bytes } => {
                self.dispatcher.on_write_complete(node, &bytes)
            }
            DriverCommand::Disconnect(node) => {
                self.dispatcher.disconnect(node);
                Ok(())
            }
            DriverCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            warn!(self.logger, "driver command failed"; "error" => %e);
        }
    }
}
