//! Core types for the agreement kernel.

pub mod config;
pub mod event;
pub mod report;
pub mod unit;

pub use config::{AgreementMode, ConfigError, MethodConfig, StrijbosMethod};
pub use event::{normalize_participant, ColumnSpec, CoderRegistry, RatingEvent};
pub use report::{
    interpret_f1, interpret_kappa, AgreementReport, CodeMetrics, MetricValue, TnSource,
    UndefinedReason,
};
pub use unit::{renumber, Agreement, ReportingStatus, Unit, UnitId};
