//! Dataset profiling and HTML quality reports.

mod html;
mod profile;

pub use html::HtmlReportGenerator;
pub use profile::{
    CorrelationMatrix, DatasetProfile, HistogramBin, NumericStats, Overview, ProfileMode,
    VariableProfile,
};
