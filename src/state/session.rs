//! Match session manager.
//!
//! Owns every active [`Duel`] and routes inbound player actions to it,
//! turning accepted mutations into outbound broadcasts. All entry points
//! take `&mut self`, so the embedding server drives one manager from a
//! single serialized execution context: actions apply in arrival order
//! and per-match state never races. A rejection in one match never
//! affects another.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::card::{CardId, DeckType};
use super::combat::AttackOutcome;
use super::duel::{Duel, DuelError, MatchConfig, Notice, WinReason};
use super::effects::ActionTarget;

/// Inbound player action, as decoded off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerAction {
    DrawFromDeck {
        deck: DeckType,
    },
    PlayCard {
        card_id: CardId,
        slot: usize,
    },
    UseActionCard {
        card_id: CardId,
        #[serde(default)]
        target: ActionTarget,
    },
    SummonLegendary {
        card_id: CardId,
        discard_ids: [CardId; 2],
        slot: usize,
    },
    RevealAttacker {
        slot: usize,
    },
    DrawPonto,
    DrawExtraPonto,
    EndAttackPhase,
    RevealDefender {
        slot: usize,
    },
    AcceptGoal,
    EndDefense,
    EndTurn,
    Surrender,
}

/// Outbound session event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    GameStart { state: serde_json::Value },
    GameUpdate { state: serde_json::Value },
    TurnStart {
        player_id: String,
        time_limit: i64,
        turn_start_time: i64,
    },
    AttackResult { outcome: AttackOutcome },
    GoldenGoalStarted,
    GameEnd { winner_id: String, reason: WinReason },
    Error { code: &'static str, message: String },
}

impl Event {
    /// Wire form. Every event is stamped with the server's clock so
    /// clients can reconcile their offset.
    pub fn to_json(&self, server_time: DateTime<Utc>) -> serde_json::Value {
        let mut obj = match self {
            Self::GameStart { state } => serde_json::json!({
                "type": "game_start",
                "state": state
            }),
            Self::GameUpdate { state } => serde_json::json!({
                "type": "game_update",
                "state": state
            }),
            Self::TurnStart {
                player_id,
                time_limit,
                turn_start_time,
            } => serde_json::json!({
                "type": "turn_start",
                "player_id": player_id,
                "time_limit": time_limit,
                "turn_start_time": turn_start_time
            }),
            Self::AttackResult { outcome } => serde_json::json!({
                "type": "attack_result",
                "result": outcome.result.as_str(),
                "damage": outcome.damage
            }),
            Self::GoldenGoalStarted => serde_json::json!({
                "type": "golden_goal_started",
                "message": "Full time, scores level: next goal wins"
            }),
            Self::GameEnd { winner_id, reason } => serde_json::json!({
                "type": "game_end",
                "winner_id": winner_id,
                "reason": reason.as_str()
            }),
            Self::Error { code, message } => serde_json::json!({
                "type": "error",
                "code": code,
                "message": message
            }),
        };
        obj["server_time"] = serde_json::json!(server_time.timestamp_millis());
        obj
    }
}

/// Who an event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Both,
    Player(String),
}

/// An event ready for the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub match_id: String,
    pub audience: Audience,
    pub event: Event,
}

impl Outbound {
    fn both(match_id: &str, event: Event) -> Self {
        Self {
            match_id: match_id.to_string(),
            audience: Audience::Both,
            event,
        }
    }

    fn to_player(match_id: &str, player_id: &str, event: Event) -> Self {
        Self {
            match_id: match_id.to_string(),
            audience: Audience::Player(player_id.to_string()),
            event,
        }
    }
}

/// Tracks all active matches plus player and disconnect indexes.
#[derive(Debug, Default)]
pub struct SessionManager {
    duels: HashMap<String, Duel>,
    /// Player ID to match ID
    player_index: HashMap<String, String>,
    /// Disconnected players and their forfeit deadlines
    disconnect_deadlines: HashMap<String, DateTime<Utc>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lobby hand-off: bind two ready players into a new match and start
    /// the clocks.
    pub fn start_match(
        &mut self,
        match_id: String,
        player1: (String, String),
        player2: (String, String),
        config: MatchConfig,
        now: DateTime<Utc>,
    ) -> Vec<Outbound> {
        if self.duels.contains_key(&match_id) {
            warn!("start_match: replacing existing match {}", match_id);
            self.remove(&match_id);
        }

        let mut duel = Duel::new(match_id.clone(), player1, player2, config, now);
        let notices = duel.kick_off(now);

        let mut out = vec![Outbound::both(
            &match_id,
            Event::GameStart {
                state: duel.to_json(now),
            },
        )];
        out.extend(events_for(&duel, &match_id, notices));

        for pid in duel.player_ids() {
            self.player_index.insert(pid.to_string(), match_id.clone());
        }
        info!("session: match {} started", match_id);
        self.duels.insert(match_id, duel);
        out
    }

    /// Route one inbound action. On rejection the error is returned to
    /// the caller (for the issuer only) and nothing is broadcast.
    pub fn handle_action(
        &mut self,
        match_id: &str,
        player_id: &str,
        action: PlayerAction,
        now: DateTime<Utc>,
    ) -> Result<Vec<Outbound>, DuelError> {
        let duel = self.duels.get_mut(match_id).ok_or(DuelError::UnknownMatch)?;

        let notices = match action {
            PlayerAction::DrawFromDeck { deck } => duel.draw_from_deck(player_id, deck),
            PlayerAction::PlayCard { card_id, slot } => duel.play_card(player_id, card_id, slot),
            PlayerAction::UseActionCard { card_id, target } => {
                duel.use_action_card(player_id, card_id, target)
            }
            PlayerAction::SummonLegendary {
                card_id,
                discard_ids,
                slot,
            } => duel.summon_legendary(player_id, card_id, discard_ids, slot),
            PlayerAction::RevealAttacker { slot } => duel.reveal_attacker(player_id, slot),
            PlayerAction::DrawPonto => duel.draw_ponto(player_id),
            PlayerAction::DrawExtraPonto => duel.draw_extra_ponto(player_id),
            PlayerAction::EndAttackPhase => duel.end_attack_phase(player_id),
            PlayerAction::RevealDefender { slot } => duel.reveal_defender(player_id, slot),
            PlayerAction::AcceptGoal => duel.accept_goal(player_id, now),
            PlayerAction::EndDefense => duel.end_defense(player_id, now),
            PlayerAction::EndTurn => duel.end_turn(player_id, now),
            PlayerAction::Surrender => duel.surrender(player_id),
        }?;

        let mut out = events_for(duel, match_id, notices);
        out.push(Outbound::both(
            match_id,
            Event::GameUpdate {
                state: duel.to_json(now),
            },
        ));

        if duel.status.is_terminal() {
            self.remove(match_id);
        }
        Ok(out)
    }

    /// Build the issuer-only error event for a rejected action.
    pub fn error_outbound(match_id: &str, player_id: &str, err: DuelError) -> Outbound {
        Outbound::to_player(
            match_id,
            player_id,
            Event::Error {
                code: err.code(),
                message: err.to_string(),
            },
        )
    }

    /// Fire every due timer across all matches. Matches are processed
    /// independently and in a stable order.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Outbound> {
        let mut out = Vec::new();

        // Disconnect grace expiries first: they tear the match down.
        let mut expired: Vec<(String, DateTime<Utc>)> = self
            .disconnect_deadlines
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(pid, deadline)| (pid.clone(), *deadline))
            .collect();
        expired.sort();
        for (player_id, _) in expired {
            self.disconnect_deadlines.remove(&player_id);
            let Some(match_id) = self.player_index.get(&player_id).cloned() else {
                continue;
            };
            let Some(duel) = self.duels.get_mut(&match_id) else {
                continue;
            };
            if let Ok(notices) = duel.forfeit_disconnected(&player_id) {
                out.extend(events_for(duel, &match_id, notices));
                out.push(Outbound::both(
                    &match_id,
                    Event::GameUpdate {
                        state: duel.to_json(now),
                    },
                ));
                self.remove(&match_id);
            }
        }

        let mut match_ids: Vec<String> = self.duels.keys().cloned().collect();
        match_ids.sort();
        for match_id in match_ids {
            let Some(duel) = self.duels.get_mut(&match_id) else {
                continue;
            };
            let mut notices = Vec::new();
            if duel.clock.match_expired(now) {
                notices.extend(duel.force_match_expiry());
            }
            if duel.status.is_active() && duel.clock.turn_expired(now) {
                notices.extend(duel.force_turn_expiry(now));
            }
            if notices.is_empty() {
                continue;
            }
            out.extend(events_for(duel, &match_id, notices));
            out.push(Outbound::both(
                &match_id,
                Event::GameUpdate {
                    state: duel.to_json(now),
                },
            ));
            if duel.status.is_terminal() {
                self.remove(&match_id);
            }
        }
        out
    }

    /// Player channel dropped: start the forfeit grace period.
    pub fn handle_disconnect(&mut self, player_id: &str, now: DateTime<Utc>) {
        let Some(match_id) = self.player_index.get(player_id) else {
            return;
        };
        let Some(duel) = self.duels.get(match_id) else {
            return;
        };
        let deadline = now + duel.config().disconnect_grace;
        info!(
            "session: {} disconnected from {}, forfeit at {}",
            player_id, match_id, deadline
        );
        self.disconnect_deadlines.insert(player_id.to_string(), deadline);
    }

    /// Player came back within the grace period. Returns a fresh
    /// snapshot for the reconnecting client.
    pub fn handle_reconnect(&mut self, player_id: &str, now: DateTime<Utc>) -> Option<Outbound> {
        self.disconnect_deadlines.remove(player_id);
        let match_id = self.player_index.get(player_id)?;
        let duel = self.duels.get(match_id)?;
        Some(Outbound::to_player(
            match_id,
            player_id,
            Event::GameUpdate {
                state: duel.to_json(now),
            },
        ))
    }

    /// Get a match.
    pub fn get(&self, match_id: &str) -> Option<&Duel> {
        self.duels.get(match_id)
    }

    /// Get the match a player is in.
    pub fn get_for_player(&self, player_id: &str) -> Option<&Duel> {
        self.player_index
            .get(player_id)
            .and_then(|id| self.duels.get(id))
    }

    /// Remove a match and clean up its indexes.
    pub fn remove(&mut self, match_id: &str) -> Option<Duel> {
        let duel = self.duels.remove(match_id)?;
        for pid in duel.player_ids() {
            self.player_index.remove(pid);
            self.disconnect_deadlines.remove(pid);
        }
        Some(duel)
    }

    pub fn active_count(&self) -> usize {
        self.duels.values().filter(|d| d.status.is_active()).count()
    }

    pub fn count(&self) -> usize {
        self.duels.len()
    }
}

/// Map state-machine notices onto broadcast events.
fn events_for(duel: &Duel, match_id: &str, notices: Vec<Notice>) -> Vec<Outbound> {
    notices
        .into_iter()
        .map(|notice| match notice {
            Notice::TurnStarted { player_id } => Outbound::both(
                match_id,
                Event::TurnStart {
                    player_id,
                    time_limit: duel.clock.turn_time_limit.num_seconds(),
                    turn_start_time: duel.clock.turn_started_at.timestamp_millis(),
                },
            ),
            Notice::AttackResolved { outcome } => {
                Outbound::both(match_id, Event::AttackResult { outcome })
            }
            Notice::GoldenGoalStarted => Outbound::both(match_id, Event::GoldenGoalStarted),
            Notice::Finished { winner_id, reason } => {
                Outbound::both(match_id, Event::GameEnd { winner_id, reason })
            }
        })
        .collect()
}
