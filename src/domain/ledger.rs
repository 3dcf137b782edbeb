//! Portfolio ledger: balance, open positions, and the closed trade log.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::position::{ExitReason, Position, PositionId, Side, Trade};

/// Why a signal was refused. Rejections are local to one signal; the
/// simulation continues with the next one.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("size_percent must be in (0, 100], got {size_percent}")]
    InvalidSize { size_percent: f64 },

    #[error("fill price must be positive, got {price}")]
    InvalidPrice { price: f64 },

    #[error("{side} levels invalid: stop {stop_loss} / target {take_profit} against entry {entry_price}")]
    InvalidLevels {
        side: Side,
        stop_loss: f64,
        take_profit: f64,
        entry_price: f64,
    },

    #[error("{requested} conflicts with open {existing} position {position_id}")]
    HedgeNotAllowed {
        requested: Side,
        existing: Side,
        position_id: PositionId,
    },

    #[error("insufficient balance: need {required:.2}, have {available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("no open position with id {0}")]
    UnknownPosition(PositionId),

    #[error("close requested with no open positions")]
    NoOpenPosition,
}

/// Authoritative owner of balance, open positions, and trade history. The
/// sole mutator of [`Position`] and [`Trade`] values.
///
/// Opening locks the position's `size_usd` out of `balance`; closing credits
/// `size_usd + pnl` back. Equity therefore counts each open position at its
/// locked margin plus unrealized pnl, so equity moves with price but not
/// with the act of opening or closing itself.
///
/// Positions are held in creation order and iterated in creation order
/// everywhere, which keeps multi-position processing deterministic.
#[derive(Debug, Clone)]
pub struct Ledger {
    initial_balance: f64,
    balance: f64,
    positions: Vec<Position>,
    trades: Vec<Trade>,
    next_id: u64,
}

impl Ledger {
    pub fn new(initial_balance: f64) -> Self {
        Ledger {
            initial_balance,
            balance: initial_balance,
            positions: Vec::new(),
            trades: Vec::new(),
            next_id: 1,
        }
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Cash not locked in margin.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Open positions in creation order.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Closed trades in close order.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn has_open_position(&self) -> bool {
        !self.positions.is_empty()
    }

    pub fn oldest_position_id(&self) -> Option<PositionId> {
        self.positions.first().map(|p| p.id)
    }

    /// Margin currently locked across all open positions.
    pub fn locked_margin(&self) -> f64 {
        self.positions.iter().map(|p| p.size_usd).sum()
    }

    /// Balance plus each open position valued at locked margin + unrealized
    /// pnl at `current_price`.
    pub fn equity(&self, current_price: f64) -> f64 {
        let open_value: f64 = self
            .positions
            .iter()
            .map(|p| p.size_usd + p.unrealized_pnl(current_price))
            .sum();
        self.balance + open_value
    }

    /// Validate and open a position at `fill_price`, locking its margin.
    pub fn open(
        &mut self,
        side: Side,
        size_percent: f64,
        stop_loss: f64,
        take_profit: f64,
        fill_price: f64,
        time: DateTime<Utc>,
    ) -> Result<Position, Rejection> {
        if !(size_percent > 0.0 && size_percent <= 100.0) {
            return Err(Rejection::InvalidSize { size_percent });
        }
        if !(fill_price > 0.0) || !fill_price.is_finite() {
            return Err(Rejection::InvalidPrice { price: fill_price });
        }
        let levels_ok = stop_loss.is_finite()
            && take_profit.is_finite()
            && match side {
                Side::Long => stop_loss < fill_price && fill_price < take_profit,
                Side::Short => take_profit < fill_price && fill_price < stop_loss,
            };
        if !levels_ok {
            return Err(Rejection::InvalidLevels {
                side,
                stop_loss,
                take_profit,
                entry_price: fill_price,
            });
        }
        if let Some(existing) = self.positions.iter().find(|p| p.side == side.opposite()) {
            return Err(Rejection::HedgeNotAllowed {
                requested: side,
                existing: existing.side,
                position_id: existing.id,
            });
        }

        let size_usd = self.equity(fill_price) * size_percent / 100.0;
        if size_usd > self.balance || size_usd <= 0.0 {
            return Err(Rejection::InsufficientBalance {
                required: size_usd,
                available: self.balance,
            });
        }

        let position = Position {
            id: PositionId(self.next_id),
            side,
            entry_price: fill_price,
            entry_time: time,
            size: size_usd / fill_price,
            size_usd,
            stop_loss,
            take_profit,
        };
        self.next_id += 1;
        self.balance -= size_usd;
        self.positions.push(position);
        debug!(
            id = %position.id,
            side = %side,
            price = fill_price,
            size_usd,
            balance = self.balance,
            "opened position"
        );
        Ok(position)
    }

    /// Close a position at `fill_price`, realizing its pnl into balance.
    pub fn close(
        &mut self,
        id: PositionId,
        fill_price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<Trade, Rejection> {
        let index = self
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or(Rejection::UnknownPosition(id))?;
        let position = self.positions.remove(index);

        let pnl = (fill_price - position.entry_price) * position.size * position.side.sign();
        let trade = Trade {
            id: position.id,
            side: position.side,
            entry_price: position.entry_price,
            exit_price: fill_price,
            entry_time: position.entry_time,
            exit_time: time,
            size: position.size,
            size_usd: position.size_usd,
            pnl,
            pnl_percent: pnl / position.size_usd * 100.0,
            exit_reason: reason,
        };
        self.balance += position.size_usd + pnl;
        self.trades.push(trade);
        debug!(
            id = %trade.id,
            price = fill_price,
            pnl,
            reason = %reason,
            balance = self.balance,
            "closed position"
        );
        Ok(trade)
    }
}
