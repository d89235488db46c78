use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Column, RowIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Conflict,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("column '{0}' is not in the layer map")]
    UnknownColumn(Column),
    #[error("row {row} is not in the colour catalog ({rows} rows)")]
    UnknownRow { row: RowIndex, rows: usize },
    #[error("cannot {action} while in {from} mode")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
    #[error("missing config key {0}")]
    MissingConfigKey(String),
    #[error("invalid config value: {0}")]
    InvalidConfigValue(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("invalid payload template: {0}")]
    InvalidPayloadTemplate(String),
}

impl ConsoleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownColumn(_) | Self::UnknownRow { .. } | Self::MissingConfigKey(_) => {
                ErrorCode::NotFound
            }
            Self::InvalidTransition { .. } => ErrorCode::Conflict,
            Self::InvalidConfigValue(_) => ErrorCode::Validation,
            Self::InvalidEndpoint(_) | Self::InvalidPayloadTemplate(_) => ErrorCode::Config,
        }
    }
}
