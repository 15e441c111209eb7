use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not Found: {0}")]
    NotFound(String), // LDG-0x10
    #[error("Already Exists: {0}")]
    AlreadyExists(String), // LDG-0x11
    #[error("Validation Error: {0}")]
    Validation(String), // LDG-0x20
    #[error("Type Mismatch: field '{field}' must be {expected}")]
    TypeMismatch { field: String, expected: String }, // LDG-0x21
    #[error("Validator Error: field '{field}' was rejected by validator '{validator}'")]
    Validator { field: String, validator: String }, // LDG-0x22
    #[error("Authorization Error: {0}")]
    Authorization(String), // LDG-0x40
    #[error("Insufficient Balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal }, // LDG-0x01
    #[error("Key Generation Error: no free address key after {attempts} attempts")]
    KeyGeneration { attempts: u32 }, // LDG-0x02
    #[error("Supply Violation: {0}")]
    SupplyViolation(String), // LDG-0x03
    #[error("Schema Error: {0}")]
    Schema(String), // LDG-0x50
    #[error("Unknown Operation: {0}")]
    UnknownOperation(String), // LDG-0x12
    #[error("Ledger IO Error: {0}")]
    LedgerIo(String), // LDG-0x30
    #[error("Serialization Error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "LDG-0x10",
            LedgerError::AlreadyExists(_) => "LDG-0x11",
            LedgerError::UnknownOperation(_) => "LDG-0x12",
            LedgerError::Validation(_) => "LDG-0x20",
            LedgerError::TypeMismatch { .. } => "LDG-0x21",
            LedgerError::Validator { .. } => "LDG-0x22",
            LedgerError::Authorization(_) => "LDG-0x40",
            LedgerError::InsufficientBalance { .. } => "LDG-0x01",
            LedgerError::KeyGeneration { .. } => "LDG-0x02",
            LedgerError::SupplyViolation(_) => "LDG-0x03",
            LedgerError::LedgerIo(_) => "LDG-0x30",
            LedgerError::Schema(_) => "LDG-0x50",
            LedgerError::Serde(_) => "LDG-0x99",
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match self {
            LedgerError::NotFound(_) | LedgerError::UnknownOperation(_) => StatusCode::NOT_FOUND,
            LedgerError::AlreadyExists(_) => StatusCode::CONFLICT,
            LedgerError::Validation(_)
            | LedgerError::TypeMismatch { .. }
            | LedgerError::Validator { .. } => StatusCode::BAD_REQUEST,
            LedgerError::Authorization(_) => StatusCode::FORBIDDEN,
            LedgerError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string(), "code": self.code() }));
        (status, body).into_response()
    }
}
