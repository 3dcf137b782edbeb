//! Structured-log alert sink.

use tracing::{info, trace, warn};

use crate::domain::engine::EngineEvent;
use crate::ports::event_port::EventSink;

/// Narrates engine events through `tracing`: fills at info, rejected
/// signals and ambiguous exits at warn, equity samples at trace.
pub struct LogAlertAdapter;

impl EventSink for LogAlertAdapter {
    fn publish(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::PositionOpened(position) => info!(
                id = %position.id,
                side = %position.side,
                price = position.entry_price,
                size_usd = position.size_usd,
                stop = position.stop_loss,
                target = position.take_profit,
                "position opened"
            ),
            EngineEvent::PositionClosed(trade) => info!(
                id = %trade.id,
                reason = %trade.exit_reason,
                exit = trade.exit_price,
                pnl = trade.pnl,
                pnl_percent = trade.pnl_percent,
                "position closed"
            ),
            EngineEvent::AmbiguousExit(trade) => warn!(
                id = %trade.id,
                "stop and target hit within one base candle; stop assumed"
            ),
            EngineEvent::SignalRejected(record) => warn!(
                signal = record.signal.label(),
                reason = %record.rejection,
                timestamp = %record.timestamp,
                "signal rejected"
            ),
            EngineEvent::EquitySample(point) => trace!(
                timestamp = %point.timestamp,
                equity = point.equity,
                "equity sample"
            ),
        }
    }
}
