//! The query/mutate HTTP interface.
//!
//! Plain request/response endpoints over the same shared session: joining,
//! answering, results, status, reset, and question selection. The realtime
//! channel stays on its own listener; these handlers only call the
//! operations the core exposes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::models::Question;
use crate::server::QuizServer;
use crate::session::{QuizState, RankedPlayer, SessionError, SessionSnapshot};

pub fn router(server: Arc<QuizServer>) -> Router {
    Router::new()
        .route("/api/join", post(join))
        .route("/api/answer", post(answer))
        .route("/api/result", get(result))
        .route("/api/session/status", get(status))
        .route("/api/session/reset", post(reset))
        .route("/api/session/questions", post(select_questions))
        .route("/api/questions", get(questions))
        .layer(CorsLayer::permissive())
        .with_state(server)
}

#[derive(Debug, Deserialize)]
struct JoinRequest {
    #[serde(default)]
    nickname: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinResponse {
    player_id: Uuid,
    nickname: String,
    status: QuizState,
}

async fn join(
    State(server): State<Arc<QuizServer>>,
    Json(request): Json<JoinRequest>,
) -> Json<JoinResponse> {
    let joined = server.register_player(request.nickname).await;
    Json(JoinResponse {
        player_id: joined.player_id,
        nickname: joined.nickname,
        status: joined.status,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    player_id: Uuid,
    question_id: usize,
    choice: usize,
}

#[derive(Debug, Serialize)]
struct AnswerResponse {
    received: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn answer(
    State(server): State<Arc<QuizServer>>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, (StatusCode, Json<ErrorBody>)> {
    match server
        .submit_answer(request.player_id, request.question_id, request.choice)
        .await
    {
        Ok(()) => Ok(Json(AnswerResponse { received: true })),
        Err(e) => {
            let status = match e {
                SessionError::UnknownPlayer => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            Err((status, Json(ErrorBody { error: e.to_string() })))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultQuery {
    #[serde(default)]
    player_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct PersonalResult {
    nickname: String,
    score: u32,
    rank: usize,
}

#[derive(Debug, Serialize)]
struct ResultResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    personal: Option<PersonalResult>,
    top3: Vec<RankedPlayer>,
    ranking: Vec<RankedPlayer>,
}

async fn result(
    State(server): State<Arc<QuizServer>>,
    Query(query): Query<ResultQuery>,
) -> Json<ResultResponse> {
    let ranking = server.ranking();
    let personal = query.player_id.and_then(|id| {
        ranking
            .iter()
            .find(|entry| entry.player_id == id)
            .map(|entry| PersonalResult {
                nickname: entry.nickname.clone(),
                score: entry.score,
                rank: entry.rank,
            })
    });
    let top3 = ranking.iter().take(3).cloned().collect();
    Json(ResultResponse {
        personal,
        top3,
        ranking,
    })
}

async fn status(State(server): State<Arc<QuizServer>>) -> Json<SessionSnapshot> {
    Json(server.snapshot())
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    success: bool,
}

async fn reset(State(server): State<Arc<QuizServer>>) -> Json<ResetResponse> {
    server.reset_session().await;
    Json(ResetResponse { success: true })
}

#[derive(Debug, Serialize)]
struct SelectResponse {
    success: bool,
    count: usize,
}

async fn select_questions(
    State(server): State<Arc<QuizServer>>,
    Json(ids): Json<Vec<u32>>,
) -> Json<SelectResponse> {
    let count = server.set_selected_questions(&ids);
    Json(SelectResponse {
        success: true,
        count,
    })
}

async fn questions(State(server): State<Arc<QuizServer>>) -> Json<Vec<Question>> {
    Json(server.question_bank())
}
