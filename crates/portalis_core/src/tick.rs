use std::sync::mpsc;

/// One frame notification from the host.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tick {
    /// Seconds since the previous tick, as measured by the host.
    pub delta_seconds: f32,
}

/// Blocks until the host's next frame. `None` means the host is tearing down
/// and the frame loop should end.
pub trait TickSource {
    fn wait_for_next_tick(&mut self) -> Option<Tick>;
}

/// Yields a fixed number of ticks, then stops.
#[derive(Debug, Clone)]
pub struct FixedTicks {
    remaining: u64,
    delta_seconds: f32,
}

impl FixedTicks {
    pub fn new(count: u64, delta_seconds: f32) -> Self {
        Self {
            remaining: count,
            delta_seconds,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl TickSource for FixedTicks {
    fn wait_for_next_tick(&mut self) -> Option<Tick> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(Tick {
            delta_seconds: self.delta_seconds,
        })
    }
}

pub struct TickSender {
    tx: mpsc::Sender<Tick>,
}

pub struct TickReceiver {
    rx: mpsc::Receiver<Tick>,
}

/// Tick source fed from another thread, e.g. a display-refresh callback.
/// Dropping every sender ends the loop.
pub fn tick_channel() -> (TickSender, TickReceiver) {
    let (tx, rx) = mpsc::channel();
    (TickSender { tx }, TickReceiver { rx })
}

impl Clone for TickSender {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl TickSender {
    pub fn send(&self, tick: Tick) -> Result<(), mpsc::SendError<Tick>> {
        self.tx.send(tick)
    }
}

impl TickSource for TickReceiver {
    fn wait_for_next_tick(&mut self) -> Option<Tick> {
        self.rx.recv().ok()
    }
}
