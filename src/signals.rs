//! Signal handling for graceful shutdown.
//!
//! A background thread listens for SIGINT, SIGTERM and SIGHUP and forwards them
//! as [`SignalMessage`]s. The control loop polls the channel between ticks, so
//! a tick in progress always completes before the daemon stops.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc::{Receiver, TryRecvError},
    thread,
};

use crate::logger::Log;

/// Message sent from the signal thread to the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    /// SIGTERM, SIGINT or SIGHUP
    Shutdown,
}

/// Signal handling state shared between threads
pub struct SignalState {
    /// Atomic flag indicating if the application should keep running
    pub running: Arc<AtomicBool>,
    /// Channel receiver for signal messages
    pub signal_receiver: Receiver<SignalMessage>,
}

impl SignalState {
    /// Drain pending messages and report whether the daemon should keep running.
    pub fn poll(&self) -> bool {
        loop {
            match self.signal_receiver.try_recv() {
                Ok(message) => handle_signal_message(message, self),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    Log::log_debug("Signal channel disconnected");
                    break;
                }
            }
        }
        self.running.load(Ordering::SeqCst)
    }
}

/// Handle a signal message received in the main loop
pub fn handle_signal_message(message: SignalMessage, signal_state: &SignalState) {
    match message {
        SignalMessage::Shutdown => signal_state.running.store(false, Ordering::SeqCst),
    }
}

/// Human-readable name for a shutdown signal.
fn signal_name(sig: i32) -> &'static str {
    match sig {
        SIGINT => "SIGINT (Ctrl+C)",
        SIGTERM => "SIGTERM (termination request)",
        SIGHUP => "SIGHUP (session logout)",
        _ => "unknown signal",
    }
}

/// Set up signal handling for the application.
///
/// Returns a SignalState containing the running flag and signal receiver channel.
/// Spawns a background thread that monitors for signals and sends appropriate
/// messages via the channel.
pub fn setup_signal_handler() -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = std::sync::mpsc::channel::<SignalMessage>();

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("failed to register signal handlers")?;

    let running_clone = running.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            Log::log_pipe();
            Log::log_decorated(&format!("Received {}, shutting down...", signal_name(sig)));

            // Set the flag directly as well, in case the receiver is already gone
            running_clone.store(false, Ordering::SeqCst);
            if signal_sender.send(SignalMessage::Shutdown).is_err() {
                break;
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
    })
}
