//! Per-side player state.
//!
//! Owns one player's hand, field, decks, score, move budget, slot locks
//! and active modifiers. Only the match state machine mutates this; the
//! network layer sees read-only JSON snapshots.

use std::collections::HashSet;

use rand::Rng;

use super::card::{Card, CardId, CardKind, Deck, FieldCard, FIELD_SLOTS};

/// Ability-state modifiers a player can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKind {
    /// The next attack against this player is voided (VAR, yashin).
    NextAttackCancelled,
    /// Player cannot summon legendary cards (shehata).
    RulesBlocked,
    /// Player cannot use action cards (iniesta).
    TacticsBlocked,
    /// Player may draw a second ponto card (ronaldo).
    ExtraPonto,
}

impl ModifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NextAttackCancelled => "next_attack_cancelled",
            Self::RulesBlocked => "rules_blocked",
            Self::TacticsBlocked => "tactics_blocked",
            Self::ExtraPonto => "extra_ponto",
        }
    }
}

/// When a modifier leaves play on its own.
///
/// `TurnEnd` lasts through this player's next turn and expires when that
/// turn ends, so a block granted by the opponent covers one full turn.
/// `UntilConsumed` modifiers are removed explicitly by the state machine
/// (e.g. NextAttackCancelled at attack start, ExtraPonto when the extra
/// ponto is drawn).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierExpiry {
    TurnEnd,
    UntilConsumed,
}

/// Well-defined points where timed expiries are re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// This player becomes the acting player.
    TurnStart,
    /// This player's turn just ended.
    TurnEnd,
    AttackStart,
    DefenseStart,
}

/// A modifier currently in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveModifier {
    pub kind: ModifierKind,
    pub expires: ModifierExpiry,
}

/// One side of a duel.
#[derive(Debug, Clone)]
pub struct DuelPlayer {
    /// Player identity supplied by the lobby collaborator.
    pub id: String,
    pub username: String,
    hand: Vec<Card>,
    field: [Option<FieldCard>; FIELD_SLOTS],
    pub score: u32,
    pub moves_remaining: u8,
    locked_slots: HashSet<usize>,
    modifiers: Vec<ActiveModifier>,
    pub player_deck: Deck,
    pub action_deck: Deck,
    pub ponto_deck: Deck,
}

impl DuelPlayer {
    pub fn new(
        id: String,
        username: String,
        player_deck: Deck,
        action_deck: Deck,
        ponto_deck: Deck,
    ) -> Self {
        Self {
            id,
            username,
            hand: Vec::new(),
            field: Default::default(),
            score: 0,
            moves_remaining: 0,
            locked_slots: HashSet::new(),
            modifiers: Vec::new(),
            player_deck,
            action_deck,
            ponto_deck,
        }
    }

    // --- hand ---

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn add_to_hand(&mut self, card: Card) {
        self.hand.push(card);
    }

    pub fn has_in_hand(&self, card_id: CardId) -> bool {
        self.hand.iter().any(|c| c.id == card_id)
    }

    pub fn hand_card(&self, card_id: CardId) -> Option<&Card> {
        self.hand.iter().find(|c| c.id == card_id)
    }

    /// Remove a card from hand by id, transferring ownership to the caller.
    pub fn take_from_hand(&mut self, card_id: CardId) -> Option<Card> {
        let index = self.hand.iter().position(|c| c.id == card_id)?;
        Some(self.hand.remove(index))
    }

    // --- field ---

    pub fn field(&self) -> &[Option<FieldCard>; FIELD_SLOTS] {
        &self.field
    }

    pub fn slot(&self, index: usize) -> Option<&FieldCard> {
        self.field.get(index).and_then(|s| s.as_ref())
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut FieldCard> {
        self.field.get_mut(index).and_then(|s| s.as_mut())
    }

    pub fn slot_is_empty(&self, index: usize) -> bool {
        index < FIELD_SLOTS && self.field[index].is_none()
    }

    pub fn place_on_field(&mut self, index: usize, card: Card) {
        debug_assert!(self.slot_is_empty(index));
        self.field[index] = Some(FieldCard::new(card));
    }

    /// Remove a field card, transferring ownership to the caller.
    pub fn take_from_field(&mut self, index: usize) -> Option<FieldCard> {
        self.field.get_mut(index).and_then(|s| s.take())
    }

    /// Re-seat a field card with its slot state intact (swap effects).
    pub fn put_field_card(&mut self, index: usize, field_card: FieldCard) {
        debug_assert!(self.slot_is_empty(index));
        self.field[index] = Some(field_card);
    }

    /// Count of face-down, unlocked cards matching a predicate.
    pub fn face_down_count(&self, pred: impl Fn(&FieldCard) -> bool) -> usize {
        self.field
            .iter()
            .enumerate()
            .filter(|(i, s)| {
                !self.locked_slots.contains(i)
                    && s.as_ref().map(|fc| !fc.revealed && pred(fc)).unwrap_or(false)
            })
            .count()
    }

    // --- moves ---

    pub fn reset_moves(&mut self, budget: u8) {
        self.moves_remaining = budget;
    }

    pub fn grant_moves(&mut self, extra: u8) {
        self.moves_remaining = self.moves_remaining.saturating_add(extra);
    }

    /// Consume one move. Returns false (state unchanged) when exhausted.
    pub fn spend_move(&mut self) -> bool {
        if self.moves_remaining == 0 {
            return false;
        }
        self.moves_remaining -= 1;
        true
    }

    // --- locks ---

    pub fn lock_slot(&mut self, index: usize) {
        if index < FIELD_SLOTS {
            self.locked_slots.insert(index);
        }
    }

    pub fn unlock_slot(&mut self, index: usize) -> bool {
        self.locked_slots.remove(&index)
    }

    pub fn is_locked(&self, index: usize) -> bool {
        self.locked_slots.contains(&index)
    }

    // --- modifiers ---

    pub fn add_modifier(&mut self, kind: ModifierKind, expires: ModifierExpiry) {
        if !self.has_modifier(kind) {
            self.modifiers.push(ActiveModifier { kind, expires });
        }
    }

    pub fn has_modifier(&self, kind: ModifierKind) -> bool {
        self.modifiers.iter().any(|m| m.kind == kind)
    }

    /// Remove a modifier explicitly (consumption). Returns whether it was set.
    pub fn consume_modifier(&mut self, kind: ModifierKind) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.kind != kind);
        before != self.modifiers.len()
    }

    /// Evaluate timed expiries at a checkpoint. Slot locks placed by the
    /// opponent last until this player's turn starts; turn-scoped
    /// modifiers last until this player's turn ends.
    pub fn expire_at(&mut self, checkpoint: Checkpoint) {
        match checkpoint {
            Checkpoint::TurnStart => self.locked_slots.clear(),
            Checkpoint::TurnEnd => self
                .modifiers
                .retain(|m| m.expires != ModifierExpiry::TurnEnd),
            // Reserved: combat-scoped modifiers (NextAttackCancelled,
            // ExtraPonto) are consumed explicitly by the state machine,
            // not expired on a timer.
            Checkpoint::AttackStart | Checkpoint::DefenseStart => {}
        }
    }

    // --- zones ---

    /// Route a consumed card onto the discard pile of the deck it came from.
    pub fn discard_card(&mut self, card: Card) {
        match card.kind {
            CardKind::Player { .. } => self.player_deck.discard(card),
            CardKind::Action { .. } => self.action_deck.discard(card),
            CardKind::Ponto { .. } => self.ponto_deck.discard(card),
        }
    }

    /// Draw from the player deck straight into hand.
    pub fn draw_player_card(&mut self, rng: &mut impl Rng) -> Option<CardId> {
        let card = self.player_deck.draw(rng)?;
        let id = card.id;
        self.hand.push(card);
        Some(id)
    }

    /// Draw from the action deck straight into hand.
    pub fn draw_action_card(&mut self, rng: &mut impl Rng) -> Option<CardId> {
        let card = self.action_deck.draw(rng)?;
        let id = card.id;
        self.hand.push(card);
        Some(id)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let field: Vec<serde_json::Value> = self
            .field
            .iter()
            .map(|slot| match slot {
                Some(fc) => fc.to_json(),
                None => serde_json::Value::Null,
            })
            .collect();

        let mut locked: Vec<usize> = self.locked_slots.iter().copied().collect();
        locked.sort_unstable();

        serde_json::json!({
            "id": self.id,
            "username": self.username,
            "hand": self.hand.iter().map(|c| c.to_json()).collect::<Vec<_>>(),
            "field": field,
            "score": self.score,
            "moves_remaining": self.moves_remaining,
            "locked_slots": locked,
            "modifiers": self.modifiers.iter().map(|m| m.kind.as_str()).collect::<Vec<_>>(),
            "player_deck_remaining": self.player_deck.remaining(),
            "action_deck_remaining": self.action_deck.remaining(),
        })
    }
}
