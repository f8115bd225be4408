//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Operations created and settled
//! - Pipeline step outcomes
//! - Validation rejections

use crate::error::{BridgeError, BridgeResult};

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref OPERATIONS_CREATED: CounterVec = register_counter_vec!(
        "lattice_operations_created_total",
        "Total operations created by transfer type",
        &["transfer_type"]
    ).unwrap();

    pub static ref OPERATIONS_SETTLED: CounterVec = register_counter_vec!(
        "lattice_operations_settled_total",
        "Total operations settled by transfer type and final status",
        &["transfer_type", "status"]
    ).unwrap();

    pub static ref STEPS_EXECUTED: CounterVec = register_counter_vec!(
        "lattice_steps_executed_total",
        "Total pipeline steps executed by action and outcome",
        &["action", "outcome"]
    ).unwrap();

    pub static ref VALIDATION_REJECTED: CounterVec = register_counter_vec!(
        "lattice_validation_rejected_total",
        "Total mint/unlock validations that rejected decoded log data",
        &["action"]
    ).unwrap();

    pub static ref OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "lattice_operation_duration_seconds",
        "End-to-end pipeline duration by transfer type and final status",
        &["transfer_type", "status"],
        vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> BridgeResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| BridgeError::Internal(e.to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| BridgeError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_operation_created(transfer_type: &str) {
    OPERATIONS_CREATED.with_label_values(&[transfer_type]).inc();
}

pub fn record_operation_settled(transfer_type: &str, status: &str) {
    OPERATIONS_SETTLED
        .with_label_values(&[transfer_type, status])
        .inc();
}

pub fn record_step(action: &str, outcome: &str) {
    STEPS_EXECUTED.with_label_values(&[action, outcome]).inc();
}

pub fn record_validation_rejected(action: &str) {
    VALIDATION_REJECTED.with_label_values(&[action]).inc();
}

pub fn record_operation_duration(transfer_type: &str, status: &str, seconds: f64) {
    OPERATION_DURATION
        .with_label_values(&[transfer_type, status])
        .observe(seconds);
}
