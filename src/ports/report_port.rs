//! Report generation port.

use std::path::Path;

use crate::domain::error::AlertsimError;
use crate::domain::simulation::SimulationResult;

/// Renders a finished run as a three-sheet tabular export (Summary, Open
/// Positions, Trade History). Formatting only, no business logic.
pub trait ReportPort {
    fn write(&self, result: &SimulationResult, output_dir: &Path) -> Result<(), AlertsimError>;
}
