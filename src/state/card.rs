//! Card and deck model.
//!
//! Cards are immutable once created; all mutable per-instance state
//! (revealed flag, accumulated yellow cards) lives on the [`FieldCard`]
//! wrapper a field slot holds. A card instance is always in exactly one
//! zone: deck, hand, field slot, or discard.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Unique card identity within a match.
pub type CardId = u32;

/// Number of field slots per player.
pub const FIELD_SLOTS: usize = 5;

/// Pitch position of a player card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldPosition {
    Fw,
    Mf,
    Df,
    Gk,
}

impl FieldPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fw => "FW",
            Self::Mf => "MF",
            Self::Df => "DF",
            Self::Gk => "GK",
        }
    }

    /// FW/MF cards may be revealed during an attack.
    pub fn is_attacking(&self) -> bool {
        matches!(self, Self::Fw | Self::Mf)
    }

    /// DF/GK cards may be revealed during a defense.
    pub fn is_defending(&self) -> bool {
        matches!(self, Self::Df | Self::Gk)
    }
}

/// Action card effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionEffect {
    Swap,
    Shoulder,
    Var,
    Mercato,
    Biter,
    RedCard,
    YellowCard,
}

impl ActionEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swap => "swap",
            Self::Shoulder => "shoulder",
            Self::Var => "var",
            Self::Mercato => "mercato",
            Self::Biter => "biter",
            Self::RedCard => "red_card",
            Self::YellowCard => "yellow_card",
        }
    }

    /// Number of slot targets the effect requires.
    pub fn target_arity(&self) -> usize {
        match self {
            Self::Swap => 2,
            Self::Shoulder | Self::Biter | Self::RedCard | Self::YellowCard => 1,
            Self::Var | Self::Mercato => 0,
        }
    }
}

/// Legendary abilities, one per legendary card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendaryAbility {
    Ronaldo,
    Iniesta,
    Shehata,
    Modric,
    Messi,
    Yashin,
}

impl LegendaryAbility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ronaldo => "ronaldo",
            Self::Iniesta => "iniesta",
            Self::Shehata => "shehata",
            Self::Modric => "modric",
            Self::Messi => "messi",
            Self::Yashin => "yashin",
        }
    }
}

/// Kind-specific card payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardKind {
    Player {
        position: FieldPosition,
        attack: u8,
        defense: u8,
    },
    Action {
        effect: ActionEffect,
    },
    Ponto {
        bonus: u8,
    },
}

/// An immutable card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub kind: CardKind,
    pub legendary: Option<LegendaryAbility>,
}

impl Card {
    pub fn is_player(&self) -> bool {
        matches!(self.kind, CardKind::Player { .. })
    }

    pub fn is_action(&self) -> bool {
        matches!(self.kind, CardKind::Action { .. })
    }

    pub fn is_ponto(&self) -> bool {
        matches!(self.kind, CardKind::Ponto { .. })
    }

    pub fn is_legendary(&self) -> bool {
        self.legendary.is_some()
    }

    pub fn position(&self) -> Option<FieldPosition> {
        match self.kind {
            CardKind::Player { position, .. } => Some(position),
            _ => None,
        }
    }

    pub fn attack_value(&self) -> u8 {
        match self.kind {
            CardKind::Player { attack, .. } => attack,
            _ => 0,
        }
    }

    pub fn defense_value(&self) -> u8 {
        match self.kind {
            CardKind::Player { defense, .. } => defense,
            _ => 0,
        }
    }

    pub fn effect(&self) -> Option<ActionEffect> {
        match self.kind {
            CardKind::Action { effect } => Some(effect),
            _ => None,
        }
    }

    pub fn ponto_bonus(&self) -> u8 {
        match self.kind {
            CardKind::Ponto { bonus } => bonus,
            _ => 0,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = match &self.kind {
            CardKind::Player {
                position,
                attack,
                defense,
            } => serde_json::json!({
                "id": self.id,
                "name": self.name,
                "kind": "player",
                "position": position.as_str(),
                "attack": attack,
                "defense": defense
            }),
            CardKind::Action { effect } => serde_json::json!({
                "id": self.id,
                "name": self.name,
                "kind": "action",
                "effect": effect.as_str()
            }),
            CardKind::Ponto { bonus } => serde_json::json!({
                "id": self.id,
                "name": self.name,
                "kind": "ponto",
                "bonus": bonus
            }),
        };
        if let Some(ability) = &self.legendary {
            obj["legendary"] = serde_json::json!(ability.as_str());
        }
        obj
    }
}

/// A card placed in a field slot, plus its per-instance slot state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCard {
    pub card: Card,
    pub revealed: bool,
    pub yellow_cards: u8,
}

impl FieldCard {
    pub fn new(card: Card) -> Self {
        Self {
            card,
            revealed: false,
            yellow_cards: 0,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = self.card.to_json();
        obj["revealed"] = serde_json::json!(self.revealed);
        if self.yellow_cards > 0 {
            obj["yellow_cards"] = serde_json::json!(self.yellow_cards);
        }
        obj
    }
}

/// Which draw pile a draw action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckType {
    Player,
    Action,
}

impl DeckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Action => "action",
        }
    }
}

/// A shuffled draw pile with its own discard pile.
///
/// Drawing from an empty pile reshuffles the discard back in.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    draw_pile: Vec<Card>,
    discard_pile: Vec<Card>,
}

impl Deck {
    pub fn new(mut cards: Vec<Card>, rng: &mut impl Rng) -> Self {
        cards.shuffle(rng);
        Self {
            draw_pile: cards,
            discard_pile: Vec::new(),
        }
    }

    /// Draw the top card, reshuffling the discard pile in if needed.
    /// Returns `None` only when both piles are empty.
    pub fn draw(&mut self, rng: &mut impl Rng) -> Option<Card> {
        if self.draw_pile.is_empty() && !self.discard_pile.is_empty() {
            std::mem::swap(&mut self.draw_pile, &mut self.discard_pile);
            self.draw_pile.shuffle(rng);
        }
        self.draw_pile.pop()
    }

    /// Put a card on the discard pile.
    pub fn discard(&mut self, card: Card) {
        self.discard_pile.push(card);
    }

    pub fn remaining(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn discarded(&self) -> usize {
        self.discard_pile.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.draw_pile.is_empty() && self.discard_pile.is_empty()
    }
}

/// Allocates match-unique card ids and builds cards.
#[derive(Debug, Default)]
pub struct CardFactory {
    next_id: CardId,
}

impl CardFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> CardId {
        self.next_id += 1;
        self.next_id
    }

    pub fn player(
        &mut self,
        name: &str,
        position: FieldPosition,
        attack: u8,
        defense: u8,
    ) -> Card {
        Card {
            id: self.next(),
            name: name.to_string(),
            kind: CardKind::Player {
                position,
                attack,
                defense,
            },
            legendary: None,
        }
    }

    pub fn legendary(
        &mut self,
        name: &str,
        position: FieldPosition,
        attack: u8,
        defense: u8,
        ability: LegendaryAbility,
    ) -> Card {
        Card {
            id: self.next(),
            name: name.to_string(),
            kind: CardKind::Player {
                position,
                attack,
                defense,
            },
            legendary: Some(ability),
        }
    }

    pub fn action(&mut self, effect: ActionEffect) -> Card {
        Card {
            id: self.next(),
            name: effect.as_str().to_string(),
            kind: CardKind::Action { effect },
            legendary: None,
        }
    }

    pub fn ponto(&mut self, bonus: u8) -> Card {
        Card {
            id: self.next(),
            name: format!("ponto-{}", bonus),
            kind: CardKind::Ponto { bonus },
            legendary: None,
        }
    }

    /// Standard player deck: a spread of FW/MF/DF/GK cards plus the six
    /// legendaries.
    pub fn standard_player_deck(&mut self) -> Vec<Card> {
        use FieldPosition::*;

        let mut cards = vec![
            self.player("striker", Fw, 6, 1),
            self.player("poacher", Fw, 5, 1),
            self.player("winger", Fw, 4, 2),
            self.player("playmaker", Mf, 4, 2),
            self.player("box-to-box", Mf, 3, 3),
            self.player("regista", Mf, 3, 2),
            self.player("anchor", Mf, 2, 3),
            self.player("centre-back", Df, 1, 5),
            self.player("stopper", Df, 1, 4),
            self.player("full-back", Df, 2, 3),
            self.player("libero", Df, 2, 4),
            self.player("keeper", Gk, 0, 6),
            self.player("sweeper-keeper", Gk, 0, 5),
        ];
        cards.push(self.legendary("ronaldo", Fw, 7, 1, LegendaryAbility::Ronaldo));
        cards.push(self.legendary("messi", Fw, 7, 2, LegendaryAbility::Messi));
        cards.push(self.legendary("iniesta", Mf, 5, 3, LegendaryAbility::Iniesta));
        cards.push(self.legendary("modric", Mf, 5, 3, LegendaryAbility::Modric));
        cards.push(self.legendary("shehata", Df, 2, 6, LegendaryAbility::Shehata));
        cards.push(self.legendary("yashin", Gk, 0, 7, LegendaryAbility::Yashin));
        cards
    }

    /// Standard action deck: two copies of each effect.
    pub fn standard_action_deck(&mut self) -> Vec<Card> {
        use ActionEffect::*;

        let effects = [Swap, Shoulder, Var, Mercato, Biter, RedCard, YellowCard];
        let mut cards = Vec::with_capacity(effects.len() * 2);
        for _ in 0..2 {
            for effect in effects {
                cards.push(self.action(effect));
            }
        }
        cards
    }

    /// Standard ponto deck: bonus values 1..=6.
    pub fn standard_ponto_deck(&mut self) -> Vec<Card> {
        (1..=6).map(|bonus| self.ponto(bonus)).collect()
    }
}
