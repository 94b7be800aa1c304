//! Endpoint paths

/// Demo application login
pub const LOGIN: &str = "/api/users/login";

/// Public practice API
pub const HEALTH_CHECK: &str = "/health-check";
pub const CARS: &str = "/cars";
pub const TIME: &str = "/time";
pub const CURRENCY_CONVERT: &str = "/currency-convert";

/// `/currency-convert` with its query string
pub fn currency_convert(from: &str, to: &str, amount: &str) -> String {
    format!("{CURRENCY_CONVERT}?from={from}&to={to}&amount={amount}")
}
