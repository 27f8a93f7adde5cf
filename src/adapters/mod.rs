//! Concrete implementations of the port traits.

pub mod csv_data_adapter;
pub mod json_alert_adapter;
pub mod td_sequential_adapter;
pub mod file_config_adapter;
pub mod csv_report_adapter;
