//! Congestion Routes
//!
//! Read-only views over the state table.
//!
//! - GET /api/v1/congestion - All cells, most congested first
//! - GET /api/v1/congestion/:cell_id - One cell
//! - GET /api/v1/heatmap - Stadium-wide summary

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::HeatmapResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::store::{CellId, CongestionRecord, TableSummary};

/// Most congested first; equal levels keep cell id order
fn by_congestion_desc(records: &mut [CongestionRecord]) {
    records.sort_by(|a, b| {
        b.congestion_level
            .total_cmp(&a.congestion_level)
            .then_with(|| a.cell_id.cmp(&b.cell_id))
    });
}

/// GET /api/v1/congestion
pub async fn list_congestion(State(state): State<Arc<AppState>>) -> Json<Vec<CongestionRecord>> {
    let mut records = state.table.get_all().await;
    by_congestion_desc(&mut records);
    Json(records)
}

/// GET /api/v1/congestion/:cell_id
pub async fn get_congestion(
    State(state): State<Arc<AppState>>,
    Path(cell_id): Path<String>,
) -> ApiResult<Json<CongestionRecord>> {
    let record = state.table.require(&CellId::new(cell_id)).await?;
    Ok(Json(record))
}

/// GET /api/v1/heatmap
pub async fn heatmap(State(state): State<Arc<AppState>>) -> Json<HeatmapResponse> {
    let mut cells = state.table.get_all().await;
    let summary = TableSummary::of(&cells);
    by_congestion_desc(&mut cells);

    Json(HeatmapResponse {
        timestamp: Utc::now(),
        total_cells: summary.tracked_cells,
        average_congestion: summary.average_congestion,
        most_congested: summary.most_congested,
        least_congested: summary.least_congested,
        cells,
    })
}
