//! CLI definition and dispatch.

use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_data_adapter::CsvDataAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_alert_adapter::JsonAlertAdapter;
use crate::adapters::td_sequential_adapter::TdSequentialAdapter;
use crate::domain::error::AlertsimError;
use crate::domain::exit_rules::ExitType;
use crate::domain::simulation::{
    IndicatorCache, SimulationConfig, SimulationResult, Simulator,
};
use crate::domain::summary::SimulationSummary;
use crate::ports::alert_port::AlertPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "alertsim", about = "Alert-driven NSE backtest simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single simulation with one exit rule
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// kc_lower, kc_middle, delta_cvd or td_strategy
        #[arg(long)]
        exit_type: String,
        /// Alert lookback in days
        #[arg(long, default_value_t = 60)]
        days: i64,
        #[arg(long, default_value_t = 10_000_000.0)]
        capital: f64,
        /// Position size as percent of capital
        #[arg(long = "position-size", default_value_t = 5.0)]
        position_size: f64,
        /// Margin allowance as percent of capital
        #[arg(long, default_value_t = 100.0)]
        margin: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Simulate as of this date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Run the td_strategy and delta_cvd simulations and compare them
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 60)]
        days: i64,
        #[arg(long, default_value_t = 10_000_000.0)]
        capital: f64,
        #[arg(long = "position-size", default_value_t = 5.0)]
        position_size: f64,
        #[arg(long, default_value_t = 100.0)]
        margin: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        as_of: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            exit_type,
            days,
            capital,
            position_size,
            margin,
            output,
            as_of,
        } => {
            let exit_type: ExitType = match exit_type.parse() {
                Ok(e) => e,
                Err(reason) => {
                    eprintln!("error: {reason}");
                    return ExitCode::from(2);
                }
            };
            run_simulations(
                &config,
                &[exit_type],
                days,
                capital,
                position_size,
                margin,
                output.as_deref(),
                as_of.as_deref(),
            )
        }
        Command::Compare {
            config,
            days,
            capital,
            position_size,
            margin,
            output,
            as_of,
        } => run_simulations(
            &config,
            &[ExitType::TdStrategy, ExitType::DeltaCvd],
            days,
            capital,
            position_size,
            margin,
            output.as_deref(),
            as_of.as_deref(),
        ),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = AlertsimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn build_simulation_config(
    adapter: &dyn ConfigPort,
    exit_type: ExitType,
    capital: f64,
    position_size: f64,
    margin: f64,
) -> SimulationConfig {
    SimulationConfig {
        exit_type,
        initial_capital: capital,
        position_size_pct: position_size,
        margin_pct: margin,
        charges_per_leg_pct: adapter.get_double("charges", "per_leg_pct", 0.25),
        overnight_charge_pct: adapter.get_double("charges", "overnight_pct", 0.2),
        warmup_days: adapter.get_int("simulation", "warmup_days", 90),
    }
}

fn required_path(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<PathBuf, AlertsimError> {
    adapter
        .get_string(section, key)
        .map(PathBuf::from)
        .ok_or_else(|| AlertsimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn resolve_as_of(as_of: Option<&str>) -> Result<NaiveDate, AlertsimError> {
    match as_of {
        Some(s) => {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| AlertsimError::ConfigInvalid {
                section: "cli".into(),
                key: "as_of".into(),
                reason: "invalid date format (expected YYYY-MM-DD)".into(),
            })
        }
        None => Ok(chrono::Local::now().date_naive()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_simulations(
    config_path: &Path,
    exit_types: &[ExitType],
    days: i64,
    capital: f64,
    position_size: f64,
    margin: f64,
    output: Option<&Path>,
    as_of: Option<&str>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let as_of = match resolve_as_of(as_of) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let (bars_dir, log_path) = match (
        required_path(&adapter, "data", "bars_dir"),
        required_path(&adapter, "alerts", "log_path"),
    ) {
        (Ok(b), Ok(l)) => (b, l),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let start = as_of - Duration::days(days);
    eprintln!("Reading alerts from {} ({} to {})", log_path.display(), start, as_of);
    let alert_port = JsonAlertAdapter::new(log_path);
    let alerts = match alert_port.fetch_alerts(start, as_of) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let alert_count: usize = alerts.values().map(|v| v.len()).sum();
    eprintln!("  {} alerts on {} days", alert_count, alerts.len());

    let data_port = CsvDataAdapter::new(bars_dir);
    let td_engine = TdSequentialAdapter::new();
    let mut cache = IndicatorCache::new();
    let report_port = CsvReportAdapter::new();
    let output_root = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("report"));

    let mut results: Vec<SimulationResult> = Vec::with_capacity(exit_types.len());
    for &exit_type in exit_types {
        let config =
            build_simulation_config(&adapter, exit_type, capital, position_size, margin);
        eprintln!("\nRunning {} simulation...", exit_type);
        let mut simulator = Simulator::new(&data_port, &td_engine, config, &mut cache);
        let result = match simulator.run(&alerts, as_of) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        print_summary(&result.summary);

        let report_dir = output_root.join(exit_type.to_string());
        if let Err(e) = report_port.write(&result, &report_dir) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Report written to: {}", report_dir.display());

        results.push(result);
    }

    if results.len() > 1 {
        print_comparison(&results);
    }
    ExitCode::SUCCESS
}

fn print_summary(summary: &SimulationSummary) {
    eprintln!("  Realized PnL:      {:.2}", summary.realized_pnl);
    eprintln!("  Unrealized PnL:    {:.2}", summary.unrealized_pnl);
    eprintln!(
        "  Total PnL:         {:.2} ({:.2}%)",
        summary.total_pnl, summary.total_pnl_pct
    );
    eprintln!(
        "  Trades:            {} closed, {} open",
        summary.closed_trades, summary.open_trades
    );
    eprintln!("  Win Rate:          {:.1}%", summary.win_rate * 100.0);
    eprintln!(
        "  Charges:           {:.2} txn, {:.2} overnight",
        summary.total_transaction_charges, summary.total_overnight_charges
    );
}

fn print_comparison(results: &[SimulationResult]) {
    eprintln!("\n=== Strategy Comparison ===");
    eprint!("{:<22}", "");
    for result in results {
        eprint!("{:>16}", result.exit_type.to_string());
    }
    eprintln!();

    let summaries: Vec<&SimulationSummary> = results.iter().map(|r| &r.summary).collect();
    let row = |label: &str, values: Vec<String>| {
        eprint!("{:<22}", label);
        for value in values {
            eprint!("{:>16}", value);
        }
        eprintln!();
    };

    row(
        "Realized PnL",
        summaries.iter().map(|s| format!("{:.2}", s.realized_pnl)).collect(),
    );
    row(
        "Unrealized PnL",
        summaries.iter().map(|s| format!("{:.2}", s.unrealized_pnl)).collect(),
    );
    row(
        "Total PnL",
        summaries.iter().map(|s| format!("{:.2}", s.total_pnl)).collect(),
    );
    row(
        "Total PnL %",
        summaries.iter().map(|s| format!("{:.2}", s.total_pnl_pct)).collect(),
    );
    row(
        "Closed Trades",
        summaries.iter().map(|s| s.closed_trades.to_string()).collect(),
    );
    row(
        "Open Trades",
        summaries.iter().map(|s| s.open_trades.to_string()).collect(),
    );
    row(
        "Win Rate %",
        summaries.iter().map(|s| format!("{:.1}", s.win_rate * 100.0)).collect(),
    );
    row(
        "Avg Win",
        summaries.iter().map(|s| format!("{:.2}", s.avg_win)).collect(),
    );
    row(
        "Avg Loss",
        summaries.iter().map(|s| format!("{:.2}", s.avg_loss)).collect(),
    );
    row(
        "Avg Holding Days",
        summaries.iter().map(|s| format!("{:.1}", s.avg_holding_days)).collect(),
    );
    row(
        "Txn Charges",
        summaries
            .iter()
            .map(|s| format!("{:.2}", s.total_transaction_charges))
            .collect(),
    );
    row(
        "Overnight Charges",
        summaries
            .iter()
            .map(|s| format!("{:.2}", s.total_overnight_charges))
            .collect(),
    );

    if let Some(winner) = results.iter().max_by(|a, b| {
        a.summary
            .total_pnl
            .partial_cmp(&b.summary.total_pnl)
            .unwrap_or(std::cmp::Ordering::Equal)
    }) {
        eprintln!("\nWinner by total PnL: {}", winner.exit_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_INI: &str = r#"
[data]
bars_dir = /tmp/bars

[alerts]
log_path = /tmp/alerts.jsonl

[charges]
per_leg_pct = 0.1
overnight_pct = 0.05

[simulation]
warmup_days = 120
"#;

    #[test]
    fn build_simulation_config_reads_charges() {
        let adapter = FileConfigAdapter::from_string(SAMPLE_INI).unwrap();
        let config =
            build_simulation_config(&adapter, ExitType::TdStrategy, 10_000_000.0, 5.0, 100.0);

        assert_eq!(config.exit_type, ExitType::TdStrategy);
        assert!((config.initial_capital - 10_000_000.0).abs() < f64::EPSILON);
        assert!((config.position_size_pct - 5.0).abs() < f64::EPSILON);
        assert!((config.margin_pct - 100.0).abs() < f64::EPSILON);
        assert!((config.charges_per_leg_pct - 0.1).abs() < f64::EPSILON);
        assert!((config.overnight_charge_pct - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.warmup_days, 120);
    }

    #[test]
    fn build_simulation_config_uses_defaults() {
        let adapter = FileConfigAdapter::from_string("[data]\nbars_dir = /tmp\n").unwrap();
        let config =
            build_simulation_config(&adapter, ExitType::KcMiddle, 100_000.0, 5.0, 0.0);

        assert!((config.charges_per_leg_pct - 0.25).abs() < f64::EPSILON);
        assert!((config.overnight_charge_pct - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.warmup_days, 90);
    }

    #[test]
    fn required_path_missing_key() {
        let adapter = FileConfigAdapter::from_string("[data]\n").unwrap();
        let result = required_path(&adapter, "data", "bars_dir");
        assert!(matches!(
            result,
            Err(AlertsimError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn resolve_as_of_parses_date() {
        let date = resolve_as_of(Some("2026-06-15")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 6, 15).unwrap());
    }

    #[test]
    fn resolve_as_of_rejects_garbage() {
        assert!(matches!(
            resolve_as_of(Some("15/06/2026")),
            Err(AlertsimError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn resolve_as_of_defaults_to_today() {
        let today = chrono::Local::now().date_naive();
        assert_eq!(resolve_as_of(None).unwrap(), today);
    }
}
