//! State management module for Golaco.
//!
//! This module provides the core match state types and the session manager:
//!
//! - `card` - Card catalog, decks, and the card factory
//! - `clock` - Dual turn/match timer with golden-goal overtime
//! - `combat` - Pure attack-versus-defense resolution
//! - `effects` - Action-card effects and legendary abilities
//! - `player` - Per-player duel state (hand, field, modifiers)
//! - `duel` - The turn and phase state machine for one match
//! - `session` - Match registry, action routing, timers, broadcasts
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         SessionManager                           │
//! │                                                                  │
//! │   match_id → Duel          player_id → match_id                  │
//! │   player_id → forfeit deadline (disconnect grace)                │
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                      Duel (per match)                      │  │
//! │  │                                                            │  │
//! │  │   draw ──▶ play ──▶ attack ──▶ defense ──▶ end             │  │
//! │  │              ▲                     │         │             │  │
//! │  │              └── next attack ◀─────┴─────────┘             │  │
//! │  │                                                            │  │
//! │  │   DuelPlayer (home)   DuelPlayer (away)   MatchClock       │  │
//! │  │   PendingAttack       MatchConfig         StdRng           │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation flows through [`SessionManager::handle_action`] or a
//! timer expiry in [`SessionManager::tick`]; both return the outbound
//! events the transport layer should deliver.

pub mod card;
pub mod clock;
pub mod combat;
pub mod duel;
pub mod effects;
pub mod player;
pub mod session;

// Re-export commonly used types
pub use card::{
    ActionEffect, Card, CardFactory, CardId, CardKind, Deck, DeckType, FieldCard, FieldPosition,
    LegendaryAbility, FIELD_SLOTS,
};
pub use clock::{DeadlineKind, MatchClock};
pub use combat::{AttackOutcome, AttackResult, PendingAttack};
pub use duel::{Duel, DuelError, MatchConfig, MatchStatus, Notice, TurnPhase, WinReason};
pub use effects::ActionTarget;
pub use player::{ActiveModifier, Checkpoint, DuelPlayer, ModifierExpiry, ModifierKind};
pub use session::{Audience, Event, Outbound, PlayerAction, SessionManager};
