//! Bounded, ordered hand-off of commands from the control socket to the loop.
//!
//! Senders never block: a full queue is reported back to the client instead of
//! stalling the transport thread. The control loop drains everything pending
//! at the start of each tick.

use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};

use thiserror::Error;

use crate::mode::Command;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("command queue is full")]
    Full,
    #[error("control loop is not accepting commands")]
    Disconnected,
}

/// Cloneable producer side of the command queue.
#[derive(Debug, Clone)]
pub struct CommandSender {
    inner: SyncSender<Command>,
}

impl CommandSender {
    pub fn try_send(&self, command: Command) -> Result<(), QueueError> {
        self.inner.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Disconnected(_) => QueueError::Disconnected,
        })
    }
}

/// Consumer side, owned by the control loop.
#[derive(Debug)]
pub struct CommandQueue {
    inner: Receiver<Command>,
}

impl CommandQueue {
    /// Create a queue holding at most `capacity` pending commands.
    pub fn bounded(capacity: usize) -> (CommandSender, CommandQueue) {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        (CommandSender { inner: tx }, CommandQueue { inner: rx })
    }

    /// Take every pending command in arrival order without blocking.
    pub fn drain(&self) -> Vec<Command> {
        let mut commands = Vec::new();
        loop {
            match self.inner.try_recv() {
                Ok(command) => commands.push(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        commands
    }
}
