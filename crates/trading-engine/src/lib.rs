//! Process logic of the trading services.
//!
//! - [`analysis`]: the per-symbol [`SignalPipeline`] behind the analysis process
//! - [`execution`]: the [`OrderExecutionCoordinator`] behind the trading process
//! - [`manager`]: forwards manager messages to the notification sink
//! - [`ingestion`]: periodic candle fetch that drives analysis
//!
//! Every handler catches its own errors and reports them on the manager
//! topic; nothing escapes into the supervisor loop.

pub mod alert;
pub mod analysis;
pub mod execution;
pub mod ingestion;
pub mod manager;

pub use alert::Alerter;
pub use analysis::{AnalysisHandler, CycleOutcome, CycleState, PipelineConfig, SignalPipeline};
pub use execution::{ExecutionConfig, ExecutionReport, OrderExecutionCoordinator, TradingHandler};
pub use ingestion::CandleIngestor;
pub use manager::ManagerHandler;
