//! Trading signals emitted by strategies.

use crate::domain::position::PositionId;

/// One strategy instruction for the current step. Opens carry sizing as a
/// percentage of current equity plus absolute stop/target prices; closes
/// optionally name a position (otherwise the oldest open position is
/// closed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    OpenLong {
        size_percent: f64,
        stop_loss: f64,
        take_profit: f64,
    },
    OpenShort {
        size_percent: f64,
        stop_loss: f64,
        take_profit: f64,
    },
    Close {
        position_id: Option<PositionId>,
    },
}

impl Signal {
    pub fn open_long(size_percent: f64, stop_loss: f64, take_profit: f64) -> Signal {
        Signal::OpenLong {
            size_percent,
            stop_loss,
            take_profit,
        }
    }

    pub fn open_short(size_percent: f64, stop_loss: f64, take_profit: f64) -> Signal {
        Signal::OpenShort {
            size_percent,
            stop_loss,
            take_profit,
        }
    }

    /// Close the oldest open position.
    pub fn close() -> Signal {
        Signal::Close { position_id: None }
    }

    /// Close a specific position.
    pub fn close_position(id: PositionId) -> Signal {
        Signal::Close {
            position_id: Some(id),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Signal::OpenLong { .. } => "open_long",
            Signal::OpenShort { .. } => "open_short",
            Signal::Close { .. } => "close",
        }
    }
}
