use std::{
   net::SocketAddr,
   sync::Arc,
};

use axum::{
   Json,
   Router,
   body::Bytes,
   extract::{
      ConnectInfo,
      Query,
      State,
   },
   http::{
      HeaderMap,
      StatusCode,
   },
   response::{
      IntoResponse,
      Response,
   },
   routing::{
      get,
      post,
   },
};
use serde::{
   Deserialize,
   Serialize,
};
use tower_http::cors::{
   AllowOrigin,
   Any,
   CorsLayer,
};
use tracing::{
   error,
   info,
   warn,
};

use crate::{
   db::Db,
   rate_limit::AdmissionController,
   scores::{
      ScoreEntry,
      SubmitScore,
   },
};

pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests. Please wait before submitting again.";

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

pub struct AppState {
   pub db:          Arc<Db>,
   pub limiter:     Arc<AdmissionController>,
   pub trust_proxy: bool,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
   limit: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
   error: &'static str,
}

#[derive(Serialize)]
struct SubmitResponse {
   success: bool,
   message: &'static str,
}

#[derive(Serialize)]
struct LeaderboardResponse {
   success:     bool,
   leaderboard: Vec<ScoreEntry>,
}

#[derive(Serialize)]
struct HealthResponse {
   status:             &'static str,
   #[serde(skip_serializing_if = "Option::is_none")]
   scores:             Option<i64>,
   tracked_identities: usize,
}

fn error_response(status: StatusCode, error: &'static str) -> Response {
   (status, Json(ErrorResponse { error })).into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
   // Reflect the caller's origin, like a permissive `origin: true` CORS setup.
   let cors = CorsLayer::new()
      .allow_origin(AllowOrigin::mirror_request())
      .allow_methods(Any)
      .allow_headers(Any);

   Router::new()
      .route(
         "/submitScore",
         post(submit_score).fallback(method_not_allowed),
      )
      .route("/getLeaderboard", get(get_leaderboard))
      .route("/health", get(health))
      .layer(cors)
      .with_state(state)
}

/// Identity used for rate limiting. Behind a trusted proxy the rightmost
/// `X-Forwarded-For` entry is the address that proxy saw; anything to its
/// left was supplied by the client and cannot be trusted.
fn client_identity(addr: SocketAddr, headers: &HeaderMap, trust_proxy: bool) -> String {
   if trust_proxy
      && let Some(forwarded) = headers
         .get_all("x-forwarded-for")
         .iter()
         .last()
         .and_then(|v| v.to_str().ok())
         .and_then(|v| v.rsplit(',').next())
         .map(str::trim)
         .filter(|v| !v.is_empty())
   {
      return forwarded.to_owned();
   }
   addr.ip().to_string()
}

async fn method_not_allowed() -> Response {
   error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn submit_score(
   State(state): State<Arc<AppState>>,
   ConnectInfo(addr): ConnectInfo<SocketAddr>,
   headers: HeaderMap,
   body: Bytes,
) -> Response {
   let identity = client_identity(addr, &headers, state.trust_proxy);

   if !state.limiter.check(&identity).is_admitted() {
      warn!(%identity, "score submission rate limited");
      return error_response(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS_MESSAGE);
   }

   let submission = if body.iter().all(u8::is_ascii_whitespace) {
      SubmitScore::default()
   } else {
      match serde_json::from_slice::<SubmitScore>(&body) {
         Ok(submission) => submission,
         Err(e) => {
            warn!(%identity, "malformed score submission: {e}");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
         },
      }
   };

   let entry = match submission.validate() {
      Ok(entry) => entry,
      Err(e) => return error_response(StatusCode::BAD_REQUEST, e.message()),
   };

   match state.db.insert_score(&entry, &identity) {
      Ok(id) => {
         info!(id, player = %entry.player_name, score = entry.score, "score submitted");
         (
            StatusCode::OK,
            Json(SubmitResponse {
               success: true,
               message: "Score submitted successfully",
            }),
         )
            .into_response()
      },
      Err(e) => {
         error!("failed to submit score: {e}");
         error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
      },
   }
}

/// Lenient `limit` parsing: anything unusable falls back to the default.
fn parse_limit(raw: Option<&str>) -> u32 {
   raw.and_then(|s| s.trim().parse::<u32>().ok())
      .filter(|&n| n > 0)
      .map_or(DEFAULT_LIMIT, |n| n.min(MAX_LIMIT))
}

async fn get_leaderboard(
   State(state): State<Arc<AppState>>,
   Query(query): Query<LeaderboardQuery>,
) -> Response {
   let limit = parse_limit(query.limit.as_deref());

   match state.db.top_scores(limit) {
      Ok(leaderboard) => (
         StatusCode::OK,
         Json(LeaderboardResponse {
            success: true,
            leaderboard,
         }),
      )
         .into_response(),
      Err(e) => {
         error!("failed to fetch leaderboard: {e}");
         error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
      },
   }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
   let tracked_identities = state.limiter.tracked_identities();
   match state.db.score_count() {
      Ok(count) => (
         StatusCode::OK,
         Json(HealthResponse {
            status: "ok",
            scores: Some(count),
            tracked_identities,
         }),
      ),
      Err(e) => {
         error!("health check failed: {e}");
         (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
               status: "error",
               scores: None,
               tracked_identities,
            }),
         )
      },
   }
}
