use axum::extract::{Path, State as AxumState};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use punto_execution::{Engine, EngineError};
use punto_types::{BetType, ErrorBody, ErrorCode, PlaceBetRequest, Reply};
use serde::Deserialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chats/:chat_id/start", post(start_game))
        .route("/chats/:chat_id/bets", post(place_bet))
        .route("/chats/:chat_id/auto/enable", post(enable_auto))
        .route("/chats/:chat_id/auto/disable", post(disable_auto))
        .route("/chats/:chat_id/status", get(status))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bet body as sent by chat adapters. Category and amount are parsed by hand
/// so that malformed values get engine error codes instead of a rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BetBody {
    user_id: String,
    user_name: String,
    bet_type: String,
    amount: Value,
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidState | ErrorCode::AlreadyActive | ErrorCode::BettingClosed => {
            StatusCode::CONFLICT
        }
        ErrorCode::InvalidAmount | ErrorCode::InvalidBetType => StatusCode::BAD_REQUEST,
        ErrorCode::Overloaded => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn reply<T: serde::Serialize>(result: Result<T, EngineError>) -> Response {
    let reply = Reply::from(result);
    let status = match &reply {
        Reply::Ok(_) => StatusCode::OK,
        Reply::Err(body) => status_for(body.code),
    };
    (status, Json(reply)).into_response()
}

fn reject(body: ErrorBody) -> Response {
    (status_for(body.code), Json(Reply::<()>::Err(body))).into_response()
}

/// Whole, non-negative amounts as a JSON number or numeric string.
fn parse_amount(raw: &Value) -> Option<u64> {
    match raw {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

async fn start_game(
    Path(chat_id): Path<String>,
    AxumState(state): AxumState<AppState>,
) -> Response {
    reply(state.engine.start_game(&chat_id).await)
}

async fn place_bet(
    Path(chat_id): Path<String>,
    AxumState(state): AxumState<AppState>,
    Json(body): Json<BetBody>,
) -> Response {
    let Ok(bet_type) = body.bet_type.parse::<BetType>() else {
        return reject(ErrorBody::new(
            ErrorCode::InvalidBetType,
            format!("unknown bet type: {}", body.bet_type),
        ));
    };
    let Some(amount) = parse_amount(&body.amount) else {
        return reject(ErrorBody::new(
            ErrorCode::InvalidAmount,
            format!("invalid bet amount: {}", body.amount),
        ));
    };
    let request = PlaceBetRequest {
        chat_id,
        user_id: body.user_id,
        user_name: body.user_name,
        bet_type,
        amount,
    };
    reply(state.engine.place_bet(request).await)
}

async fn enable_auto(
    Path(chat_id): Path<String>,
    AxumState(state): AxumState<AppState>,
) -> Response {
    reply(state.engine.enable_auto(&chat_id).await)
}

async fn disable_auto(
    Path(chat_id): Path<String>,
    AxumState(state): AxumState<AppState>,
) -> Response {
    reply(state.engine.disable_auto(&chat_id).await)
}

async fn status(
    Path(chat_id): Path<String>,
    AxumState(state): AxumState<AppState>,
) -> Response {
    match state.engine.status(&chat_id) {
        Ok(status) => Json(status).into_response(),
        Err(err) => reject(err.into()),
    }
}

async fn healthz() -> &'static str {
    "ok"
}
