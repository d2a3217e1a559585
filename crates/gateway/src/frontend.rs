//! Minimal HTML front end.
//!
//! `GET /?query=...` runs the agent and renders the result; without a query
//! it serves a one-field form that submits back to the same URL. The page
//! is a minijinja template, auto-escaped because its name ends in `.html`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
};
use minijinja::{Environment, context};
use serde::Deserialize;
use tracing::{error, info};

use crate::SharedState;

const INDEX_TEMPLATE: &str = include_str!("templates/index.html");

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub query: Option<String>,
}

pub async fn index_handler(
    State(state): State<SharedState>,
    Query(params): Query<IndexQuery>,
) -> Result<Html<String>, (StatusCode, String)> {
    let query = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let result = match query {
        Some(query) => {
            info!(query_len = query.len(), "Page run requested");
            Some(state.agent.run(query, None).await)
        }
        None => None,
    };

    render_index(query, result.as_deref()).map(Html).map_err(|e| {
        error!(error = %e, "Failed to render page");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page".to_string())
    })
}

/// Render the page; with a query it shows the run result line by line.
pub fn render_index(query: Option<&str>, result: Option<&str>) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("index.html", INDEX_TEMPLATE)?;

    let lines: Vec<&str> = result.map(|r| r.split('\n').collect()).unwrap_or_default();
    env.get_template("index.html")?.render(context! {
        query => query,
        lines => lines,
    })
}
