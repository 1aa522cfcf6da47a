//! Shift reconciliation and cash-drawer accounting for a single-register
//! apparel POS.
//!
//! The ledger derives the open shift from a rolling event window bounded by
//! the `lastShiftReportTime` watermark, aggregates it into a cash-flow
//! summary, reconciles the operator's drawer count against it at close, and
//! supports cascading reopen with a ten-second undo. Closing is atomic:
//! deficit expense, shift document, and watermark advance commit together
//! or not at all.
//!
//! Flow: [`shifts::open_shift_preview`] (selector + calculator) →
//! operator count → [`shifts::close_shift`] → [`shifts::reopen_shift`] /
//! [`shifts::undo_reopen`] when history needs rewriting.

use std::path::Path;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod db;
pub mod error;
pub mod expenses;
pub mod models;
pub mod report;
pub mod sales;
pub mod shifts;
pub mod summary;
pub mod undo;
pub mod window;

pub use db::DbState;
pub use error::{LedgerError, Result};
pub use models::{
    DailyExpense, PaymentMethod, Reconciliation, ReturnDetail, Sale, SaleItem, Shift,
    ShiftSummary, ShiftWindow, VarianceType,
};
pub use shifts::{CloseOutcome, ReopenOutcome};
pub use undo::UndoSlot;

/// Initialize structured logging (console + optional rolling daily file).
///
/// Returns the appender guard when a log directory is given — dropping it
/// flushes buffered log lines, so the embedder should hold it for the
/// process lifetime.
pub fn init_logging(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,drawer_ledger=debug"));

    let console_layer = fmt::layer().with_target(true);

    let mut guard = None;
    let file_layer = log_dir.map(|dir| {
        std::fs::create_dir_all(dir).ok();
        let file_appender = tracing_appender::rolling::daily(dir, "ledger");
        let (non_blocking, g) = tracing_appender::non_blocking(file_appender);
        guard = Some(g);
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("drawer-ledger v{} logging initialized", env!("CARGO_PKG_VERSION"));

    guard
}
