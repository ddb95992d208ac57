use std::time::UNIX_EPOCH;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        version::{get_rust_version, get_version},
        STARTUP_TIME, TOP_QUOTES_LIMIT,
    },
    error::AppError,
    identity::VisitorToken,
    models::{
        quotes::{QuoteStats, SortKey},
        reactions::{ReactForm, ReactionKind, ReactionOutcome},
    },
    quotes, ranking, reactions, selector, Data,
};

#[derive(Debug, Serialize)]
pub struct RandomQuoteResponse {
    pub quote: Option<QuoteStats>,
    pub user_reaction: Option<ReactionKind>,
}

/// GET /
#[tracing::instrument(skip_all)]
pub async fn random_quote(
    State(data): State<Data>,
    visitor: VisitorToken,
) -> Result<(CookieJar, Json<RandomQuoteResponse>), AppError> {
    let quote = selector::pick_random_quote(&data.db).await?;

    let user_reaction = match (&quote, visitor.is_new) {
        (Some(quote), false) => reactions::user_reaction(&data.db, quote.id, &visitor.token).await?,
        _ => None,
    };

    Ok((
        visitor.cookie_jar(data.config.cookie_max_age),
        Json(RandomQuoteResponse {
            quote,
            user_reaction,
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct TopParams {
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TopQuotesResponse {
    pub sort: SortKey,
    pub quotes: Vec<QuoteStats>,
}

/// GET /top/?sort=likes|dislikes|views|new
#[tracing::instrument(skip(data))]
pub async fn top_quotes(
    State(data): State<Data>,
    Query(params): Query<TopParams>,
) -> Result<Json<TopQuotesResponse>, AppError> {
    let sort = SortKey::from_param(params.sort.as_deref());
    let quotes = ranking::top_quotes(&data.db, sort, TOP_QUOTES_LIMIT).await?;

    Ok(Json(TopQuotesResponse { sort, quotes }))
}

/// POST /quote/:id/react/
#[tracing::instrument(skip(data, visitor, form))]
pub async fn react(
    State(data): State<Data>,
    Path(quote_id): Path<i64>,
    visitor: VisitorToken,
    Form(form): Form<ReactForm>,
) -> Result<(CookieJar, Json<ReactionOutcome>), AppError> {
    let kind = form.kind()?;
    let outcome = reactions::react(&data.db, quote_id, &visitor.token, kind).await?;

    Ok((visitor.cookie_jar(data.config.cookie_max_age), Json(outcome)))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub rust_version: String,
    pub quotes: i64,
    pub reactions: i64,
    pub uptime_secs: u64,
}

/// GET /status
#[tracing::instrument(skip_all)]
pub async fn status(State(data): State<Data>) -> Result<Json<StatusResponse>, AppError> {
    let quotes = quotes::count_quotes(&data.db).await?;
    let reactions = reactions::count_reactions(&data.db).await?;

    let started = STARTUP_TIME
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let now = std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    Ok(Json(StatusResponse {
        version: get_version(),
        rust_version: get_rust_version(),
        quotes,
        reactions,
        uptime_secs: now.saturating_sub(started),
    }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    "OK"
}
