//! Pure status derivation from a snapshot.

use serde::{Deserialize, Serialize};

use crate::model::{GameStateSnapshot, Player, PlayerId, SessionStatus};

/// What the local player should currently be looking at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Loading,
    Waiting,
    Active,
    Eliminated,
    GameOver,
    Countdown,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusInfo {
    pub status: GameStatus,
    pub is_my_turn: bool,
    pub is_eliminated: bool,
    pub is_game_over: bool,
    pub active_players_count: usize,
    pub final_standings: Vec<Player>,
}

/// Number of players still holding points.
pub fn active_players_count(players: &[Player]) -> usize {
    players.iter().filter(|p| !p.is_eliminated()).count()
}

/// The game is over once nobody holds points (including nobody at all).
pub fn is_game_over(players: &[Player]) -> bool {
    active_players_count(players) == 0
}

/// Unknown ids are not eliminated.
pub fn is_player_eliminated(players: &[Player], id: PlayerId) -> bool {
    players
        .iter()
        .find(|p| p.id == id)
        .is_some_and(Player::is_eliminated)
}

/// Players ordered by points, highest first. Ties keep snapshot order.
pub fn final_standings(players: &[Player]) -> Vec<Player> {
    let mut standings = players.to_vec();
    standings.sort_by(|a, b| b.points.cmp(&a.points));
    standings
}

pub fn top_players(players: &[Player], n: usize) -> Vec<Player> {
    let mut standings = final_standings(players);
    standings.truncate(n);
    standings
}

/// Derives the local status.
///
/// Checked in order, first match wins: channel not open, countdown, game
/// over, local player eliminated, local puzzle present, waiting.
pub fn derive_status(
    snapshot: &GameStateSnapshot,
    local_id: PlayerId,
    has_my_puzzle: bool,
    channel_open: bool,
) -> StatusInfo {
    let players = &snapshot.players;
    let is_eliminated = is_player_eliminated(players, local_id);
    let is_game_over = is_game_over(players);
    let is_my_turn = has_my_puzzle && !is_eliminated && !is_game_over;

    let status = if !channel_open {
        GameStatus::Loading
    } else if snapshot.session.status == SessionStatus::Countdown {
        GameStatus::Countdown
    } else if is_game_over {
        GameStatus::GameOver
    } else if is_eliminated {
        GameStatus::Eliminated
    } else if is_my_turn {
        GameStatus::Active
    } else {
        GameStatus::Waiting
    };

    StatusInfo {
        status,
        is_my_turn,
        is_eliminated,
        is_game_over,
        active_players_count: active_players_count(players),
        final_standings: final_standings(players),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionInfo;

    fn player(id: PlayerId, points: i64) -> Player {
        Player {
            id,
            username: format!("p{id}"),
            points,
            color: None,
        }
    }

    fn snapshot(status: SessionStatus, points: &[i64]) -> GameStateSnapshot {
        GameStateSnapshot {
            session: SessionInfo {
                id: 1,
                status,
                ..SessionInfo::default()
            },
            team: None,
            players: points
                .iter()
                .enumerate()
                .map(|(i, &p)| player(i as PlayerId + 1, p))
                .collect(),
            puzzles: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn test_active_count_and_game_over() {
        let players = vec![player(1, 10), player(2, 0), player(3, -4)];
        assert_eq!(active_players_count(&players), 1);
        assert!(!is_game_over(&players));

        let players = vec![player(1, 0), player(2, -1)];
        assert_eq!(active_players_count(&players), 0);
        assert!(is_game_over(&players));

        assert!(is_game_over(&[]));
    }

    #[test]
    fn test_final_standings_sorted_and_stable() {
        let players = vec![player(1, 15), player(2, 10), player(3, 0), player(4, 5)];
        let points: Vec<i64> = final_standings(&players).iter().map(|p| p.points).collect();
        assert_eq!(points, vec![15, 10, 5, 0]);

        let tied = vec![player(1, 5), player(2, 9), player(3, 5), player(4, 5)];
        let ids: Vec<PlayerId> = final_standings(&tied).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_top_players() {
        let players = vec![player(1, 1), player(2, 3), player(3, 2)];
        let ids: Vec<PlayerId> = top_players(&players, 2).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_loading_wins_over_everything() {
        let snap = snapshot(SessionStatus::Countdown, &[0, 0]);
        let info = derive_status(&snap, 1, true, false);
        assert_eq!(info.status, GameStatus::Loading);
        assert!(info.is_game_over);
    }

    #[test]
    fn test_precedence_order() {
        let snap = snapshot(SessionStatus::Countdown, &[0, 0]);
        assert_eq!(derive_status(&snap, 1, true, true).status, GameStatus::Countdown);

        let snap = snapshot(SessionStatus::Active, &[0, 0]);
        assert_eq!(derive_status(&snap, 1, true, true).status, GameStatus::GameOver);

        let snap = snapshot(SessionStatus::Active, &[0, 20]);
        let info = derive_status(&snap, 1, true, true);
        assert_eq!(info.status, GameStatus::Eliminated);
        assert!(!info.is_my_turn);

        let snap = snapshot(SessionStatus::Active, &[10, 20]);
        let info = derive_status(&snap, 1, true, true);
        assert_eq!(info.status, GameStatus::Active);
        assert!(info.is_my_turn);

        assert_eq!(derive_status(&snap, 1, false, true).status, GameStatus::Waiting);
    }

    #[test]
    fn test_missing_local_player_is_not_eliminated() {
        let snap = snapshot(SessionStatus::Active, &[10]);
        let info = derive_status(&snap, 99, false, true);
        assert!(!info.is_eliminated);
        assert_eq!(info.status, GameStatus::Waiting);
    }
}
