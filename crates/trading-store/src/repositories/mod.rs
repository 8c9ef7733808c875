//! Postgres implementations of the persistence traits.

mod candles;
mod signals;
mod trades;

pub use candles::PgCandleRepository;
pub use signals::PgSignalRepository;
pub use trades::PgTradeRepository;
