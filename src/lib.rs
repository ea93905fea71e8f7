//! Golaco State Library
//!
//! This crate provides state management for Golaco card duel logic.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Turn State Machine** - Drives each match through its draw, play,
//!   attack, defense, and end phases with validated transitions.
//!
//! - **Card System** - Player, action, and ponto decks with a zone
//!   invariant: every card is in exactly one of deck, hand, field, or
//!   discard.
//!
//! - **Combat Resolution** - Pure comparison of revealed attack and
//!   defense sums, plus goal forfeits and voided attacks.
//!
//! - **Session Management** - Match registry with action routing, dual
//!   turn/match timers, golden-goal overtime, and disconnect grace.
//!
//! # Design Principles
//!
//! 1. **Rejections are inert** - An illegal action returns an error and
//!    leaves the match state untouched.
//!
//! 2. **Time is a parameter** - Nothing reads the wall clock; every
//!    expiry check takes `now`, so tests are deterministic.
//!
//! 3. **No networking** - This crate is pure state, no WebSocket or HTTP.
//!    The embedding server delivers the returned events.
//!
//! 4. **Serialization-ready** - All types can be converted to JSON for
//!    clients, with hidden zones reduced to counts.
//!
//! # Example
//!
//! ```rust
//! use golaco_state::state::{DeckType, MatchConfig, PlayerAction, SessionManager};
//! use chrono::Utc;
//!
//! let mut sessions = SessionManager::new();
//! let now = Utc::now();
//! let config = MatchConfig {
//!     seed: Some(7),
//!     ..MatchConfig::default()
//! };
//!
//! let events = sessions.start_match(
//!     "match-1".to_string(),
//!     ("p1".to_string(), "Alice".to_string()),
//!     ("p2".to_string(), "Bruno".to_string()),
//!     config,
//!     now,
//! );
//! assert!(!events.is_empty());
//!
//! // Whoever won the kick-off completes a mandatory draw.
//! let acting = sessions.get("match-1").unwrap().current_turn.clone();
//! let action = PlayerAction::DrawFromDeck { deck: DeckType::Player };
//! let events = sessions.handle_action("match-1", &acting, action, now).unwrap();
//! assert!(!events.is_empty());
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
