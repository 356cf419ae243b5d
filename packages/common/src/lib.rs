pub mod alert;
pub mod storage;

pub use alert::{AlertSeverity, AlertSource, AlertStatus, ParseAlertFieldError};
