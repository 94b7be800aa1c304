//! Response contracts
//!
//! A contract is a typed payload plus the checks serde cannot express.
//! [`super::ApiResponse::parse`] applies both.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use storefront_common::UserResponse;

pub trait Contract: DeserializeOwned {
    /// Name used in violation reports
    const NAME: &'static str;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: i64,
    pub name: String,
    pub price: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarsResponse {
    pub status: String,
    pub cars: Vec<Car>,
}

impl Contract for CarsResponse {
    const NAME: &'static str = "CarsResponse";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyConvertResponse {
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub amount: f64,
    pub converted: f64,
}

impl Contract for CurrencyConvertResponse {
    const NAME: &'static str = "CurrencyConvertResponse";
}

/// Error payload of the practice API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl Contract for ErrorResponse {
    const NAME: &'static str = "ErrorResponse";

    fn validate(&self) -> Result<(), String> {
        if self.error.is_empty() {
            return Err("error must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeResponse {
    /// ISO 8601 timestamp
    pub time: String,
}

impl Contract for TimeResponse {
    const NAME: &'static str = "TimeResponse";
}

impl Contract for UserResponse {
    const NAME: &'static str = "UserResponse";

    fn validate(&self) -> Result<(), String> {
        UserResponse::validate(self)
    }
}
