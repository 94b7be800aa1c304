//! Practice API scenarios

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::json;

use storefront_common::LoginCredentials;

use crate::api::{
    access_token, endpoints, ApiRequest, ApiResponse, CarsResponse, CurrencyConvertResponse,
    ErrorResponse, TimeResponse,
};
use crate::error::{E2eError, E2eResult};
use crate::fixtures::TestContext;
use crate::runner::{Project, Scenario};

use super::ensure;

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "health check should return 200",
            tags: &["@smoke", "@api"],
            project: Project::Api,
            run: health,
        },
        Scenario {
            name: "should return 404 for unknown endpoint",
            tags: &["@sanity", "@api"],
            project: Project::Api,
            run: unknown_endpoint,
        },
        Scenario {
            name: "should return valid time payload",
            tags: &["@sanity", "@api"],
            project: Project::Api,
            run: time,
        },
        Scenario {
            name: "should return cars payload matching contract",
            tags: &["@sanity", "@api"],
            project: Project::Api,
            run: cars,
        },
        Scenario {
            name: "should convert currency and match contract",
            tags: &["@smoke", "@api"],
            project: Project::Api,
            run: currency_convert,
        },
        Scenario {
            name: "should return 400 for invalid amount",
            tags: &["@sanity", "@api"],
            project: Project::Api,
            run: currency_convert_invalid_amount,
        },
        Scenario {
            name: "should log in with configured credentials",
            tags: &["@api", "@auth"],
            project: Project::Api,
            run: login,
        },
        Scenario {
            name: "should return 401 for invalid credentials",
            tags: &["@sanity", "@api", "@auth"],
            project: Project::Api,
            run: login_invalid_credentials,
        },
    ]
}

fn regex(pattern: &str) -> E2eResult<Regex> {
    Regex::new(pattern).map_err(|e| E2eError::AssertionFailed(format!("invalid pattern: {e}")))
}

async fn get(ctx: &TestContext, path: &str) -> E2eResult<ApiResponse> {
    let base = ctx.config().site.api_url()?;
    ctx.api()
        .request(ApiRequest::get(path).with_base_url(base))
        .await
}

fn health(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = get(ctx, endpoints::HEALTH_CHECK).await?;
        response.expect_status(200)?;
        Ok(())
    })
}

fn unknown_endpoint(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = get(ctx, "/this-endpoint-should-not-exist").await?;
        response.expect_status(404)?;
        Ok(())
    })
}

fn time(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = get(ctx, endpoints::TIME).await?;
        let parsed: TimeResponse = response.expect_status(200)?.parse()?;

        let iso = regex(r"^\d{4}-\d{2}-\d{2}T")?;
        ensure(iso.is_match(&parsed.time), || {
            format!("time '{}' is not an ISO timestamp", parsed.time)
        })
    })
}

fn cars(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = get(ctx, endpoints::CARS).await?;
        let parsed: CarsResponse = response.expect_status(200)?.parse()?;

        ensure(parsed.status == "success", || {
            format!("status is '{}'", parsed.status)
        })?;
        let first = parsed
            .cars
            .first()
            .ok_or_else(|| E2eError::AssertionFailed("no cars returned".to_string()))?;

        ensure(first.id > 0, || format!("car id {} is not positive", first.id))?;
        ensure(!first.name.is_empty(), || "car name is empty".to_string())?;

        let price = regex(r"^(?:\p{Sc}|\bEUR\b)")?;
        ensure(price.is_match(&first.price), || {
            format!("price '{}' has no currency prefix", first.price)
        })?;

        let image = regex(r"^/|^https?://")?;
        ensure(image.is_match(&first.image), || {
            format!("image '{}' is not a path or URL", first.image)
        })
    })
}

fn currency_convert(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let (from, to, amount) = ("USD", "EUR", 100.0_f64);
        let response = get(ctx, &endpoints::currency_convert(from, to, "100")).await?;
        let parsed: CurrencyConvertResponse = response.expect_status(200)?.parse()?;

        ensure(parsed.from == from && parsed.to == to, || {
            format!("converted {} -> {}", parsed.from, parsed.to)
        })?;
        ensure(parsed.amount == amount, || format!("amount is {}", parsed.amount))?;
        ensure(parsed.rate > 0.0, || format!("rate is {}", parsed.rate))?;
        ensure(parsed.converted > 0.0, || {
            format!("converted is {}", parsed.converted)
        })?;

        let expected = parsed.amount * parsed.rate;
        ensure((parsed.converted - expected).abs() < 5e-6, || {
            format!("converted {} != amount * rate {}", parsed.converted, expected)
        })
    })
}

fn currency_convert_invalid_amount(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let response = get(ctx, &endpoints::currency_convert("USD", "EUR", "abc")).await?;
        let parsed: ErrorResponse = response.expect_status(400)?.parse()?;

        ensure(parsed.error == "Missing or invalid parameters", || {
            format!("unexpected error message '{}'", parsed.error)
        })
    })
}

fn login(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let token = access_token(ctx.api(), ctx.config()).await?;
        ensure(!token.is_empty(), || "empty access token".to_string())
    })
}

fn login_invalid_credentials(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let base = ctx.config().site.api_url()?;
        let credentials = LoginCredentials::generate();
        let response = ctx
            .api()
            .request(
                ApiRequest::post(
                    endpoints::LOGIN,
                    json!({ "email": credentials.email, "password": credentials.password }),
                )
                .with_base_url(base),
            )
            .await?;
        response.expect_status(401)?.parse::<ErrorResponse>()?;
        Ok(())
    })
}
