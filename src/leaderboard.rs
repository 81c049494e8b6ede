use crate::store::Collection;
use crate::types::quiz::Submission;
use crate::types::user::User;

use serde::Serialize;
use uuid::Uuid;

use std::collections::HashMap;

pub const LEADERBOARD_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub student: Uuid,
    pub average_percentage: f64,
    pub attempts: u32,
}

/// Averages every student's percentage, best average first, then most
/// attempts. Ties after that fall back to the student id so the order is
/// stable between requests.
pub fn rank<'a>(submissions: impl IntoIterator<Item = &'a Submission>) -> Vec<Standing> {
    let mut totals: HashMap<Uuid, (f64, u32)> = HashMap::new();
    for submission in submissions {
        let entry = totals.entry(submission.student).or_insert((0.0, 0));
        entry.0 += submission.percentage;
        entry.1 += 1;
    }

    let mut standings: Vec<Standing> = totals
        .into_iter()
        .map(|(student, (sum, attempts))| Standing {
            student,
            average_percentage: sum / f64::from(attempts),
            attempts,
        })
        .collect();
    standings.sort_by(|a, b| {
        b.average_percentage
            .total_cmp(&a.average_percentage)
            .then_with(|| b.attempts.cmp(&a.attempts))
            .then_with(|| a.student.cmp(&b.student))
    });
    standings.truncate(LEADERBOARD_LIMIT);
    standings
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: usize,
    pub student: Uuid,
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub average_percentage: f64,
    pub attempts: u32,
}

pub fn rows(standings: Vec<Standing>, users: &Collection<User>) -> Vec<LeaderboardRow> {
    standings
        .into_iter()
        .enumerate()
        .map(|(index, standing)| {
            let user = users.get(standing.student);
            LeaderboardRow {
                rank: index + 1,
                student: standing.student,
                name: user.map(|user| user.name.clone()),
                username: user.map(|user| user.username.clone()),
                avatar: user.and_then(|user| user.avatar.clone()),
                average_percentage: standing.average_percentage,
                attempts: standing.attempts,
            }
        })
        .collect()
}
