//! Inverse kinematics by table lookup.
//!
//! The five-bar arm has up to four poses for each joint position, and some of
//! them fold the arm into itself. Rather than picking branches in closed
//! form, we sweep the whole angle grid once, keep the poses that are safe,
//! and then answer "which pose draws here?" by a nearest-neighbor search
//! over the recorded pen tips.

pub mod io;
pub mod kdtree;
pub mod resolve;
pub mod table;

pub use kdtree::{KdTree, LinearScan, Neighbor, SpatialIndex};
pub use resolve::{AcceptAll, Interference, Resolver, ResolverConfig, SafetyCheck};
pub use table::{AngleGrid, CalibrationTable, IndexedTable, SafetyLimits, TableEntry};

#[derive(Debug, thiserror::Error)]
pub enum LutError {
    #[error("the calibration table has no entries")]
    EmptyTable,
    #[error("expected header {expected:?}, found {found:?}")]
    Header { expected: String, found: String },
    #[error("table was built for a different mechanism (expected {expected}, found {found})")]
    MechanismMismatch { expected: String, found: String },
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("bad index file: {0}")]
    Index(#[from] postcard::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LutError>;
