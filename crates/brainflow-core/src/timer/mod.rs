mod durations;
mod engine;
mod ticker;

pub use durations::{DurationField, Durations};
pub use engine::{CountdownEngine, EngineStatus, TimerState, DEFAULT_TICK_INTERVAL_SECS};
pub use ticker::{ManualTicker, TickSignal, Ticker, TickerArm, TokioTicker};
