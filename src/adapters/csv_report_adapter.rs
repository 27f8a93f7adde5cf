//! CSV report adapter.
//!
//! Writes the three report sheets as CSV files into an output directory:
//! `summary.csv`, `open_positions.csv` and `trade_history.csv`.

use std::fs;
use std::path::Path;

use crate::domain::error::AlertsimError;
use crate::domain::simulation::SimulationResult;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn report_err(e: impl std::fmt::Display) -> AlertsimError {
    AlertsimError::Report {
        reason: e.to_string(),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &SimulationResult, output_dir: &Path) -> Result<(), AlertsimError> {
        fs::create_dir_all(output_dir)?;

        let summary = &result.summary;
        let mut wtr =
            csv::Writer::from_path(output_dir.join("summary.csv")).map_err(report_err)?;
        wtr.write_record(["metric", "value"]).map_err(report_err)?;
        let rows: [(&str, String); 17] = [
            ("exit_type", result.exit_type.to_string()),
            ("initial_capital", format!("{:.2}", result.ledger.initial_capital)),
            ("realized_pnl", format!("{:.2}", summary.realized_pnl)),
            ("unrealized_pnl", format!("{:.2}", summary.unrealized_pnl)),
            ("total_pnl", format!("{:.2}", summary.total_pnl)),
            ("total_pnl_pct", format!("{:.4}", summary.total_pnl_pct)),
            ("closed_trades", summary.closed_trades.to_string()),
            ("open_trades", summary.open_trades.to_string()),
            ("wins", summary.wins.to_string()),
            ("losses", summary.losses.to_string()),
            ("win_rate", format!("{:.4}", summary.win_rate)),
            ("loss_rate", format!("{:.4}", summary.loss_rate)),
            ("avg_win", format!("{:.2}", summary.avg_win)),
            ("avg_loss", format!("{:.2}", summary.avg_loss)),
            ("avg_holding_days", format!("{:.2}", summary.avg_holding_days)),
            (
                "total_transaction_charges",
                format!("{:.2}", summary.total_transaction_charges),
            ),
            (
                "total_overnight_charges",
                format!("{:.2}", summary.total_overnight_charges),
            ),
        ];
        for (metric, value) in rows {
            wtr.write_record([metric, &value]).map_err(report_err)?;
        }
        wtr.flush()?;

        let mut wtr =
            csv::Writer::from_path(output_dir.join("open_positions.csv")).map_err(report_err)?;
        wtr.write_record([
            "ticker",
            "entry_date",
            "entry_price",
            "quantity",
            "last_close",
            "unrealized_pnl",
            "unrealized_pnl_pct",
            "state",
            "overnight_charges",
            "days_held",
        ])
        .map_err(report_err)?;
        for mark in &result.open_marks {
            wtr.write_record([
                mark.ticker.as_str(),
                &mark.entry_date.to_string(),
                &format!("{:.2}", mark.entry_price),
                &mark.quantity.to_string(),
                &format!("{:.2}", mark.last_close),
                &format!("{:.2}", mark.unrealized_pnl),
                &format!("{:.4}", mark.unrealized_pnl_pct),
                &mark.state.code().to_string(),
                &format!("{:.2}", mark.overnight_charges),
                &mark.days_held.to_string(),
            ])
            .map_err(report_err)?;
        }
        wtr.flush()?;

        let mut wtr =
            csv::Writer::from_path(output_dir.join("trade_history.csv")).map_err(report_err)?;
        wtr.write_record([
            "ticker",
            "entry_date",
            "entry_price",
            "exit_date",
            "exit_price",
            "quantity",
            "pnl",
            "pnl_pct",
            "exit_reason",
            "holding_days",
            "entry_kc_lower",
            "entry_kc_middle",
            "entry_kc_upper",
            "tranche",
        ])
        .map_err(report_err)?;
        for trade in &result.ledger.closed_trades {
            let tranche = trade
                .tranche
                .map(|t| t.to_string())
                .unwrap_or_default();
            wtr.write_record([
                trade.ticker.as_str(),
                &trade.entry_date.to_string(),
                &format!("{:.2}", trade.entry_price),
                &trade.exit_date.to_string(),
                &format!("{:.2}", trade.exit_price),
                &trade.quantity.to_string(),
                &format!("{:.2}", trade.pnl),
                &format!("{:.4}", trade.pnl_pct),
                &trade.reason.to_string(),
                &trade.holding_days.to_string(),
                &format!("{:.2}", trade.entry_kc.lower),
                &format!("{:.2}", trade.entry_kc.middle),
                &format!("{:.2}", trade.entry_kc.upper),
                &tranche,
            ])
            .map_err(report_err)?;
        }
        wtr.flush()?;

        Ok(())
    }
}
