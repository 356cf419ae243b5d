#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity tier of an alert, ordered from least to most severe.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "low"))]
    Low,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "medium"))]
    Medium,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "high"))]
    High,
}

impl AlertSeverity {
    pub const ALL: &'static [AlertSeverity] = &[Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Which pathway produced an alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    /// Requested by the plot owner.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "manual"))]
    Manual,
    /// Raised by the scheduled sweep.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "automated"))]
    Automated,
}

impl AlertSource {
    pub const ALL: &'static [AlertSource] = &[Self::Manual, Self::Automated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automated => "automated",
        }
    }
}

/// Review state of an alert.
///
/// Variants are declared in lifecycle order; a status may only move forward.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Newly created, not yet seen by the owner.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "unread"))]
    Unread,
    /// Seen by the owner.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "acknowledged"))]
    Acknowledged,
    /// Closed by the owner.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "resolved"))]
    Resolved,
}

impl AlertStatus {
    pub const ALL: &'static [AlertStatus] = &[Self::Unread, Self::Acknowledged, Self::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }

    /// Returns true if moving from `self` to `next` is allowed.
    ///
    /// Re-applying the current status is allowed so that acknowledge/resolve
    /// requests are idempotent.
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        next >= *self
    }
}

impl Default for AlertStatus {
    fn default() -> Self {
        Self::Unread
    }
}

macro_rules! impl_text_enum {
    ($ty:ident, $field:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseAlertFieldError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| ParseAlertFieldError {
                        field: $field,
                        invalid: s.to_string(),
                        valid: $ty::ALL.iter().map(|v| v.as_str()).collect(),
                    })
            }
        }
    };
}

impl_text_enum!(AlertSeverity, "severity");
impl_text_enum!(AlertSource, "source");
impl_text_enum!(AlertStatus, "status");

/// Error when parsing an invalid severity, source or status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAlertFieldError {
    field: &'static str,
    invalid: String,
    valid: Vec<&'static str>,
}

impl fmt::Display for ParseAlertFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid {} '{}'. Valid values: {}",
            self.field,
            self.invalid,
            self.valid.join(", ")
        )
    }
}

impl std::error::Error for ParseAlertFieldError {}
