//! Bounded scalar controls.
//!
//! A control surface (slider, keyboard binding, network command) holds a
//! [`ScalarControl`] and emits updates; the component being tuned owns the
//! matching [`ScalarReceiver`] and applies the latest update on its next
//! frame tick. Nothing is shared besides the channel.

use std::ops::RangeInclusive;

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

/// Sending half, cheap to clone.
#[derive(Clone, Debug)]
pub struct ScalarControl {
    tx: UnboundedSender<f32>,
}

impl ScalarControl {
    /// Emit an update. Returns `false` if the value is not finite or the
    /// receiving component is gone.
    pub fn set(&self, value: f32) -> bool {
        if !value.is_finite() {
            log::warn!("ignoring non-finite control value {value}");
            return false;
        }
        self.tx.unbounded_send(value).is_ok()
    }
}

#[derive(Debug)]
pub struct ScalarReceiver {
    rx: UnboundedReceiver<f32>,
    value: f32,
    range: RangeInclusive<f32>,
}

impl ScalarReceiver {
    /// Current value, without looking at pending updates.
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn range(&self) -> &RangeInclusive<f32> {
        &self.range
    }

    /// Apply every pending update, clamped to the range, and return the
    /// resulting value. The last update wins.
    pub fn poll_latest(&mut self) -> f32 {
        while let Ok(Some(value)) = self.rx.try_next() {
            let clamped = value.clamp(*self.range.start(), *self.range.end());
            if clamped != value {
                log::warn!("control value {value} clamped to {clamped}");
            }
            self.value = clamped;
        }
        self.value
    }
}

/// Create a control bounded by `range`, starting at `initial` (clamped).
pub fn scalar_channel(initial: f32, range: RangeInclusive<f32>) -> (ScalarControl, ScalarReceiver) {
    let (tx, rx) = unbounded();
    let value = initial.clamp(*range.start(), *range.end());
    (ScalarControl { tx }, ScalarReceiver { rx, value, range })
}
