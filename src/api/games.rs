//! Game management API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::engine::{
    AbilityScores, ActionRequest, ActionResult, Attack, Character, EngineError, Position,
    DEFAULT_SPEED,
};

/// Build the games router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{game_id}", get(get_game))
        .route("/games/{game_id}/characters", post(add_character))
        .route("/games/{game_id}/start", post(start_game))
        .route("/games/{game_id}/turn/{character_id}", get(turn_state))
        .route(
            "/games/{game_id}/characters/{character_id}/action",
            post(submit_action),
        )
        .route("/games/{game_id}/log", get(game_log))
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// HTTP status for an engine rejection
fn error_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::GameNotFound(_) | EngineError::CharacterNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::NotYourTurn => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn error_response(err: &EngineError) -> axum::response::Response {
    (
        error_status(err),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Game creation request
#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub name: String,
}

/// Game creation response
#[derive(Debug, Serialize)]
pub struct CreateGameResponse {
    pub game_id: String,
    pub name: String,
    pub status: &'static str,
}

/// Create a new game in the waiting state
async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> impl IntoResponse {
    let game_id = state.registry.create_game(&req.name).await;
    (
        StatusCode::CREATED,
        Json(CreateGameResponse {
            game_id,
            name: req.name,
            status: "waiting",
        }),
    )
}

/// Get game metadata and roster
async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.game_summary(&game_id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Character creation request
#[derive(Debug, Deserialize)]
pub struct CreateCharacterRequest {
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub ability_scores: AbilityScores,
    pub max_hp: i32,
    pub armor_class: i32,
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default)]
    pub attacks: Vec<Attack>,
    pub position: Position,
}

fn default_speed() -> u32 {
    DEFAULT_SPEED
}

/// Character creation response
#[derive(Debug, Serialize)]
pub struct CreateCharacterResponse {
    pub character_id: String,
    pub name: String,
    pub position: Position,
}

/// Add a character to a waiting game
async fn add_character(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(req): Json<CreateCharacterRequest>,
) -> impl IntoResponse {
    let id = uuid::Uuid::new_v4().to_string();
    let mut character = Character::new(&id, &req.name, &req.owner_id, req.max_hp, req.armor_class)
        .with_scores(req.ability_scores)
        .with_speed(req.speed);
    character.attacks = req.attacks;

    match state
        .registry
        .add_character(&game_id, character, req.position)
        .await
    {
        Ok(character_id) => (
            StatusCode::CREATED,
            Json(CreateCharacterResponse {
                character_id,
                name: req.name,
                position: req.position,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Start response
#[derive(Debug, Serialize)]
pub struct StartGameResponse {
    pub status: &'static str,
    pub initiative_order: Vec<String>,
}

/// Start combat, rolling and fixing the initiative order
async fn start_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.start_combat(&game_id).await {
        Ok(initiative_order) => Json(StartGameResponse {
            status: "active",
            initiative_order,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Get the turn state as seen by one character
async fn turn_state(
    State(state): State<AppState>,
    Path((game_id, character_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.registry.turn_state(&game_id, &character_id).await {
        Ok(turn) => Json(turn).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Submit an action for a character
///
/// Rejections that name a real game and character come back as a failed
/// `ActionResult` so agents see the same shape either way.
async fn submit_action(
    State(state): State<AppState>,
    Path((game_id, character_id)): Path<(String, String)>,
    Json(req): Json<ActionRequest>,
) -> impl IntoResponse {
    match state
        .registry
        .submit_action(&game_id, &character_id, &req)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e @ EngineError::GameNotFound(_)) | Err(e @ EngineError::CharacterNotFound(_)) => {
            error_response(&e)
        }
        Err(e) => (error_status(&e), Json(ActionResult::rejected(req.action, &e))).into_response(),
    }
}

/// Get the ordered event log of a game
async fn game_log(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.game_log(&game_id).await {
        Ok(events) => Json(serde_json::json!({ "events": events })).into_response(),
        Err(e) => error_response(&e),
    }
}
