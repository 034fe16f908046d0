//! Test helper utilities
//!
//! Shared fixtures and a scriptable suggestion generator.

#![allow(dead_code)]

pub mod generator;

pub use generator::{GeneratorScript, ScriptedGenerator};

use perftriage_common::{DiscoveredApi, MatchColor, MatchedApi, MeasurementRecord, Tier};
use perftriage_engine::models::SuggestionRequest;

pub fn record(id: &str, rt: f64, err: f64, thr: f64, p95: f64) -> MeasurementRecord {
    MeasurementRecord::new(id, rt, err, thr, p95)
}

pub fn discovered(path: &str, method: &str, function: &str) -> DiscoveredApi {
    DiscoveredApi {
        endpoint_path: path.to_string(),
        http_method: method.to_string(),
        file_path: "app/routes.py".to_string(),
        function_name: function.to_string(),
        framework_hint: "FastAPI".to_string(),
        snippet: format!("def {}():\n    pass", function),
        line_number: Some(10),
    }
}

/// A worst-tier request for `endpoint_id` matched to `/path` taken from the id
pub fn request(endpoint_id: &str) -> SuggestionRequest {
    let path = endpoint_id.split_whitespace().last().unwrap_or(endpoint_id);
    let matched = MatchedApi {
        endpoint_id: endpoint_id.to_string(),
        discovered: discovered(path, "GET", "handler"),
        confidence: 1.0,
        color: MatchColor::Red,
    };
    SuggestionRequest::new(
        record(endpoint_id, 2500.0, 12.0, 4.0, 3200.0),
        matched,
        Tier::Worst,
    )
}

/// Generator output for a well-formed, non-trivial suggestion
pub fn suggestion_json(title: &str) -> String {
    serde_json::json!({
        "title": title,
        "issue": "N+1 query",
        "explanation": "Each user triggers a separate orders query",
        "current_code": "for user in users:\n    user.orders = db.query(Order).filter(Order.user_id == user.id).all()",
        "improved_code": "orders = db.query(Order).filter(Order.user_id.in_(ids)).all()\nby_user = group_by(orders, key=lambda o: o.user_id)",
        "expected_improvement": "90% fewer queries",
        "summary": "Batch the orders lookup"
    })
    .to_string()
}
