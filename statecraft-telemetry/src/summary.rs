//! Session-in-progress summary sent on page teardown.
//!
//! Distinct from the unload guard's raw queue: this is a snapshot of how far
//! the player got, marked `incomplete` so the backend can tell it apart from
//! a finished-session summary.

use serde::{Deserialize, Serialize};

use crate::session::SessionState;

/// Host-supplied snapshot of game progress at the moment of teardown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionProgress {
    pub started: bool,
    pub finished: bool,
    pub game_id: Option<String>,
    pub role: Option<String>,
    pub day: Option<u32>,
    pub screen: Option<String>,
}

/// Wire body for `POST /api/log/summary` (beacon only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPayload {
    pub user_id: String,
    pub session_id: String,
    pub game_id: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_screen: Option<String>,
    pub duration_ms: u64,
    /// Always true on this path: the session was torn down mid-game.
    pub incomplete: bool,
}

/// Build the partial-summary payload, or `None` when any guard condition
/// fails: the game must have started and not finished, a game id and role
/// must exist, and a valid session (id, start time, user id) must be active.
#[must_use]
pub fn build_summary(
    session: &SessionState,
    progress: &SessionProgress,
    now_ms: u64,
) -> Option<SummaryPayload> {
    if !progress.started || progress.finished {
        return None;
    }
    let game_id = progress.game_id.clone()?;
    let role = progress.role.clone()?;
    let user_id = session.fields.user_id.clone()?;
    let session_id = session.session_id.clone()?;
    let started_at = session.fields.session_start_time?;
    Some(SummaryPayload {
        user_id,
        session_id,
        game_id,
        role,
        day: progress.day,
        current_screen: progress.screen.clone(),
        duration_ms: now_ms.saturating_sub(started_at),
        incomplete: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionFields;

    fn active_session() -> SessionState {
        SessionState {
            fields: SessionFields {
                user_id: Some("u1".to_string()),
                game_version: Some("1.4.0".to_string()),
                session_start_time: Some(10_000),
                ..SessionFields::default()
            },
            session_id: Some("s1".to_string()),
            enabled: true,
        }
    }

    fn live_progress() -> SessionProgress {
        SessionProgress {
            started: true,
            finished: false,
            game_id: Some("g1".to_string()),
            role: Some("chancellor".to_string()),
            day: Some(4),
            screen: Some("dilemma".to_string()),
        }
    }

    #[test]
    fn full_preconditions_produce_a_summary() {
        let payload = build_summary(&active_session(), &live_progress(), 25_000).unwrap();
        assert_eq!(payload.duration_ms, 15_000);
        assert_eq!(payload.role, "chancellor");
        assert!(payload.incomplete);

        let wire = serde_json::to_value(&payload).unwrap();
        assert_eq!(wire["sessionId"], "s1");
        assert_eq!(wire["incomplete"], true);
        assert_eq!(wire["durationMs"], 15_000);
    }

    #[test]
    fn any_failed_guard_suppresses_the_summary() {
        let session = active_session();

        let mut not_started = live_progress();
        not_started.started = false;
        assert!(build_summary(&session, &not_started, 25_000).is_none());

        let mut finished = live_progress();
        finished.finished = true;
        assert!(build_summary(&session, &finished, 25_000).is_none());

        let mut no_game = live_progress();
        no_game.game_id = None;
        assert!(build_summary(&session, &no_game, 25_000).is_none());

        let mut no_role = live_progress();
        no_role.role = None;
        assert!(build_summary(&session, &no_role, 25_000).is_none());

        let mut no_session = active_session();
        no_session.session_id = None;
        assert!(build_summary(&no_session, &live_progress(), 25_000).is_none());

        let mut no_start_time = active_session();
        no_start_time.fields.session_start_time = None;
        assert!(build_summary(&no_start_time, &live_progress(), 25_000).is_none());
    }

    #[test]
    fn duration_never_underflows_on_clock_skew() {
        let payload = build_summary(&active_session(), &live_progress(), 5_000).unwrap();
        assert_eq!(payload.duration_ms, 0);
    }
}
