//! Elo ranking engine.
//!
//! Pure rating math for 1v1, free-for-all ("squad"), and team battles, plus
//! the season/ranking records the store keeps per user. All rating updates
//! are applied by the store inside the same transaction that assigns a
//! finishing position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::INITIAL_RATING;

/// Standard K-factor: bounds how far one battle can move a rating.
pub const K_FACTOR: f64 = 32.0;

/// A time-bounded rating context. At most one season is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Season {
    pub fn new(name: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            start_date: start,
            end_date: None,
            is_active: true,
        }
    }
}

/// Per-user rating within a season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub username: String,
    pub season_id: Uuid,
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
    pub total_matches: u32,
}

impl Ranking {
    pub fn new(username: impl Into<String>, season_id: Uuid) -> Self {
        Self {
            username: username.into(),
            season_id,
            rating: INITIAL_RATING,
            wins: 0,
            losses: 0,
            total_matches: 0,
        }
    }

    /// Apply a rating delta and record the match outcome.
    pub fn apply(&mut self, delta: f64, won: bool) {
        self.rating += delta;
        self.total_matches += 1;
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
    }
}

/// Row of the global leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: u32,
    pub username: String,
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
    pub total_matches: u32,
}

/// Probability that a player rated `own` beats a player rated `opponent`.
pub fn expected_score(own: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - own) / 400.0))
}

/// Rating deltas for a head-to-head battle: `(winner_delta, loser_delta)`.
pub fn elo_1v1(winner: f64, loser: f64, k: f64) -> (f64, f64) {
    let expected_winner = expected_score(winner, loser);
    let expected_loser = expected_score(loser, winner);
    (k * (1.0 - expected_winner), k * (0.0 - expected_loser))
}

/// Rating deltas for a free-for-all battle.
///
/// `players` pairs each rating with a finishing position (1 = first). Each
/// player's expected score is the mean of pairwise expectations against every
/// opponent; the actual score maps position linearly onto `[0, 1]`:
/// `(N - position) / (N - 1)`.
///
/// Returns one delta per input, in input order. Fewer than two players yields
/// all-zero deltas.
pub fn elo_squad(players: &[(f64, u32)], k: f64) -> Vec<f64> {
    let n = players.len();
    if n < 2 {
        return vec![0.0; n];
    }

    players
        .iter()
        .enumerate()
        .map(|(i, &(rating, position))| {
            let expected: f64 = players
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &(other, _))| expected_score(rating, other))
                .sum::<f64>()
                / (n as f64 - 1.0);

            let actual = (n as f64 - f64::from(position)) / (n as f64 - 1.0);
            k * (actual - expected)
        })
        .collect()
}

/// A team in a team battle: member ratings plus the team's finishing position.
#[derive(Debug, Clone)]
pub struct TeamStanding {
    pub member_ratings: Vec<f64>,
    pub position: u32,
}

/// Rating deltas for a team battle.
///
/// Team ratings are member means; each team computes its expected score as
/// the mean of pairwise expectations against every other team, and every
/// member of a team receives the same delta. Returns one delta per team, in
/// input order.
pub fn elo_team(teams: &[TeamStanding], k: f64) -> Vec<f64> {
    let n = teams.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let team_ratings: Vec<f64> = teams
        .iter()
        .map(|team| {
            if team.member_ratings.is_empty() {
                INITIAL_RATING
            } else {
                team.member_ratings.iter().sum::<f64>() / team.member_ratings.len() as f64
            }
        })
        .collect();

    teams
        .iter()
        .enumerate()
        .map(|(i, team)| {
            let own = team_ratings[i];
            let expected: f64 = team_ratings
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &other)| expected_score(own, other))
                .sum::<f64>()
                / (n as f64 - 1.0);

            let actual = (n as f64 - f64::from(team.position)) / (n as f64 - 1.0);
            k * (actual - expected)
        })
        .collect()
}
