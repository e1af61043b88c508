//! AWS Lambda handler serving premium quotes
//!
//! Loads both fitted models once at startup into an explicit handle, then
//! prices one rating record per request. Supports Lambda Function URLs for
//! direct HTTP access: `GET /` is a health check, `POST /predict` returns
//! the frequency/severity/premium breakdown. Invalid input and core errors
//! are reported as failed predictions, never silently defaulted ones.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use premium_engine::{Expenses, PricingModels, Quote, RatingRecord};
use serde::Deserialize;
use std::sync::Arc;

/// Quote request: the full rating record (all factors required), plus an
/// optional expense block for the commercial premium.
#[derive(Debug, Deserialize)]
struct QuoteRequest {
    #[serde(flatten)]
    record: RatingRecord,

    #[serde(default)]
    expenses: Option<Expenses>,
}

fn error_response(status: u16, message: &str) -> Response<Body> {
    let body = serde_json::json!({ "error": message }).to_string();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Text(body))
        .unwrap()
}

fn json_response(body: &Quote) -> Response<Body> {
    Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Body::Text(serde_json::to_string(body).unwrap()))
        .unwrap()
}

/// Lambda handler function
async fn handler(models: &PricingModels, event: Request) -> Result<Response<Body>, Error> {
    // Handle CORS preflight
    if event.method().as_str() == "OPTIONS" {
        return Ok(Response::builder()
            .status(200)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .body(Body::Empty)
            .unwrap());
    }

    // Health check
    if event.method().as_str() == "GET" {
        return Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(Body::Text(r#"{"status":"ok"}"#.to_string()))
            .unwrap());
    }

    // Parse request body
    let body_str = match event.body() {
        Body::Text(s) => s.clone(),
        Body::Binary(b) => String::from_utf8_lossy(b).to_string(),
        Body::Empty => "{}".to_string(),
    };

    let request: QuoteRequest = match serde_json::from_str(&body_str) {
        Ok(r) => r,
        Err(e) => {
            return Ok(error_response(400, &format!("Invalid JSON: {}", e)));
        }
    };

    if let Err(e) = request.record.validate_ranges() {
        return Ok(error_response(422, &e.to_string()));
    }

    match models.quote(&request.record, request.expenses.as_ref()) {
        Ok(quote) => Ok(json_response(&quote)),
        Err(e) => Ok(error_response(400, &format!("Prediction failed: {}", e))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let model_dir = std::env::var("MODEL_DIR").unwrap_or_else(|_| "models".to_string());
    let models = Arc::new(PricingModels::load_dir(&model_dir)?);
    log::info!("models loaded from {}", model_dir);

    run(service_fn(move |event: Request| {
        let models = Arc::clone(&models);
        async move { handler(&models, event).await }
    }))
    .await
}
