//! Patient data model.
//!
//! - [`record`]: the [`PatientRecord`] with unified feature lookup
//! - [`series`]: hourly streams over the observation window
//! - [`laboratory`]: laboratory summary statistics
//! - [`loader`]: wide-row CSV loading and the [`PatientSource`] collaborator

pub mod laboratory;
pub mod loader;
pub mod record;
pub mod series;

pub use laboratory::LabSummary;
pub use loader::{record_from_row, CsvPatientSource, PatientSource, WidePatientTable};
pub use record::{Ethnicity, Gender, MlTensors, PatientRecord};
pub use series::HourlySeries;
