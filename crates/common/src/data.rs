//! Test data factories
//!
//! Every generator produces unique values so parallel workers never
//! collide on server-side state. Override fields with struct update
//! syntax:
//!
//! ```
//! use storefront_common::{AeUser, Country};
//!
//! let user = AeUser { country: Country::India, ..AeUser::generate() };
//! assert_eq!(user.country.as_str(), "India");
//! ```

use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Countries offered by the AutomationExercise signup form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Country {
    #[default]
    Canada,
    #[serde(rename = "United States")]
    UnitedStates,
    India,
    Australia,
    Israel,
    #[serde(rename = "New Zealand")]
    NewZealand,
    Singapore,
}

impl Country {
    /// Option label in the signup form
    pub fn as_str(&self) -> &'static str {
        match self {
            Country::Canada => "Canada",
            Country::UnitedStates => "United States",
            Country::India => "India",
            Country::Australia => "Australia",
            Country::Israel => "Israel",
            Country::NewZealand => "New Zealand",
            Country::Singapore => "Singapore",
        }
    }
}

/// A signup-ready AutomationExercise account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address1: String,
    pub address2: String,
    pub country: Country,
    pub state: String,
    pub city: String,
    pub zip_code: String,
    pub mobile_number: String,
}

impl AeUser {
    /// Build a user with fixed profile data and a unique email
    pub fn generate() -> Self {
        Self {
            name: "Kaspars".to_string(),
            email: unique_email("kaspars"),
            password: "Test12345!".to_string(),
            first_name: "Kaspars".to_string(),
            last_name: "Lapsa".to_string(),
            company: "Automation Portfolio".to_string(),
            address1: "1 Test Street".to_string(),
            address2: "Apt 2".to_string(),
            country: Country::Canada,
            state: "QC".to_string(),
            city: "Montreal".to_string(),
            zip_code: "H1A1A1".to_string(),
            mobile_number: "+37120000000".to_string(),
        }
    }
}

/// Unique throwaway mailbox address
pub fn unique_email(prefix: &str) -> String {
    let ts = chrono::Utc::now().timestamp_millis();
    let salt = Alphanumeric
        .sample_string(&mut rand::thread_rng(), 4)
        .to_lowercase();
    format!("{prefix}.{ts}{salt}@mailinator.com")
}

/// User record as returned by the application's login endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl UserResponse {
    /// Random, schema-valid user record
    pub fn generate() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: random_email(),
            token: Alphanumeric.sample_string(&mut rand::thread_rng(), 64),
        }
    }

    /// Check the record shape the login endpoint promises
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("id must not be empty".to_string());
        }
        if !self.email.contains('@') {
            return Err(format!("email '{}' is not an address", self.email));
        }
        if self.token.is_empty() {
            return Err("token must not be empty".to_string());
        }
        Ok(())
    }
}

/// Email/password pair for login forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%";

impl LoginCredentials {
    /// Random email and a 12-character password
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let password = (0..12)
            .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
            .collect();
        Self {
            email: random_email(),
            password,
        }
    }
}

fn random_email() -> String {
    let local = Alphanumeric
        .sample_string(&mut rand::thread_rng(), 10)
        .to_lowercase();
    format!("qa.{local}@example.com")
}
