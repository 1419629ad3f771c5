use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use benchwatch_analysis::TrendPoint;
use benchwatch_core::{Measurement, Polarity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub tool: Option<String>,
    pub benchmark: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSummary {
    pub tool: String,
    pub benchmark: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub tool: String,
    pub benchmark: String,
    pub polarity: Polarity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub entries: Vec<Measurement>,
    pub trend: Vec<TrendPoint>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SeriesReply {
    One(SeriesResponse),
    List { series: Vec<SeriesSummary> },
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/series", get(get_series))
}

/// Without parameters, list every series. With `tool` and `benchmark`,
/// return that series (empty if unknown) and its trend.
async fn get_series(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SeriesQuery>, QueryRejection>,
) -> Result<Json<SeriesReply>, ApiError> {
    let Query(query) = query?;

    match (query.tool, query.benchmark) {
        (None, None) => {
            let series = state
                .store()
                .export()
                .into_iter()
                .map(|(key, view)| SeriesSummary {
                    count: view.len(),
                    tool: key.tool,
                    benchmark: key.benchmark,
                })
                .collect();
            Ok(Json(SeriesReply::List { series }))
        }
        (Some(tool), Some(benchmark)) => {
            let view = state.store().series(&tool, &benchmark);
            let trend = state.coordinator.analyzer().trend(&view)?;
            Ok(Json(SeriesReply::One(SeriesResponse {
                polarity: state.coordinator.config().polarity_for(view.key()),
                unit: view.tail().map(|m| m.unit.clone()),
                entries: view.entries().to_vec(),
                trend,
                tool,
                benchmark,
            })))
        }
        _ => Err(ApiError::bad_request(
            "INVALID_QUERY",
            "both 'tool' and 'benchmark' are required to select a series",
        )),
    }
}
