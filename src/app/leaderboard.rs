use crate::leaderboard::{self, LeaderboardRow};
use crate::state;

use axum::Json;
use axum::extract::State;

pub(crate) async fn leaderboard(State(state): State<state::AppState>) -> Json<Vec<LeaderboardRow>> {
    let rows = state
        .db
        .read(|c| {
            let standings = leaderboard::rank(c.submissions.iter());
            leaderboard::rows(standings, &c.users)
        })
        .await;
    Json(rows)
}
