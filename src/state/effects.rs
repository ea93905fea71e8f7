//! Action-card effects and legendary abilities.
//!
//! Each effect declares a target arity and domain; validation runs before
//! any mutation so a rejected action leaves hand and field untouched.
//! Ability dispatch is a closed enum match, so adding a card without a
//! handler fails to compile.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::card::{ActionEffect, LegendaryAbility, FIELD_SLOTS};
use super::duel::DuelError;
use super::player::{DuelPlayer, ModifierExpiry, ModifierKind};

/// Inbound target selection for an action card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionTarget {
    None,
    OwnSlot { slot: usize },
    OpponentSlot { slot: usize },
    /// Two-step selection: one own slot plus one opponent slot.
    Swap { own_slot: usize, opponent_slot: usize },
}

impl Default for ActionTarget {
    fn default() -> Self {
        Self::None
    }
}

/// Validate the target domain for an effect without mutating anything.
fn validate(
    effect: ActionEffect,
    target: ActionTarget,
    issuer: &DuelPlayer,
    opponent: &DuelPlayer,
) -> Result<(), DuelError> {
    match (effect, target) {
        (ActionEffect::Swap, ActionTarget::Swap { own_slot, opponent_slot }) => {
            if own_slot >= FIELD_SLOTS || opponent_slot >= FIELD_SLOTS {
                return Err(DuelError::InvalidTarget);
            }
            if issuer.slot(own_slot).is_none() || opponent.slot(opponent_slot).is_none() {
                return Err(DuelError::SlotEmpty);
            }
            Ok(())
        }
        (ActionEffect::Shoulder | ActionEffect::Biter, ActionTarget::OwnSlot { slot }) => {
            if slot >= FIELD_SLOTS {
                return Err(DuelError::InvalidTarget);
            }
            if issuer.slot(slot).is_none() {
                return Err(DuelError::SlotEmpty);
            }
            Ok(())
        }
        (
            ActionEffect::RedCard | ActionEffect::YellowCard,
            ActionTarget::OpponentSlot { slot },
        ) => {
            if slot >= FIELD_SLOTS {
                return Err(DuelError::InvalidTarget);
            }
            if opponent.slot(slot).is_none() {
                return Err(DuelError::SlotEmpty);
            }
            Ok(())
        }
        (ActionEffect::Var | ActionEffect::Mercato, ActionTarget::None) => Ok(()),
        // Anything else is a target outside the effect's domain.
        _ => Err(DuelError::InvalidTarget),
    }
}

/// Validate and apply an action-card effect. Atomic: on `Err` neither
/// side has changed, and the caller keeps the action card in hand.
pub fn use_action(
    effect: ActionEffect,
    target: ActionTarget,
    issuer: &mut DuelPlayer,
    opponent: &mut DuelPlayer,
    yellow_card_threshold: u8,
    rng: &mut impl Rng,
) -> Result<(), DuelError> {
    validate(effect, target, issuer, opponent)?;

    match (effect, target) {
        (ActionEffect::Swap, ActionTarget::Swap { own_slot, opponent_slot }) => {
            let mine = issuer.take_from_field(own_slot).ok_or(DuelError::SlotEmpty)?;
            let theirs = match opponent.take_from_field(opponent_slot) {
                Some(fc) => fc,
                None => {
                    issuer.put_field_card(own_slot, mine);
                    return Err(DuelError::SlotEmpty);
                }
            };
            issuer.put_field_card(own_slot, theirs);
            opponent.put_field_card(opponent_slot, mine);
        }
        (ActionEffect::Shoulder, ActionTarget::OwnSlot { slot }) => {
            // Recovery play: shake off a lock and one booked yellow.
            issuer.unlock_slot(slot);
            if let Some(fc) = issuer.slot_mut(slot) {
                fc.yellow_cards = fc.yellow_cards.saturating_sub(1);
            }
        }
        (ActionEffect::Biter, ActionTarget::OwnSlot { slot }) => {
            // The marked-up opposing slot is out of the next exchange.
            opponent.lock_slot(slot);
        }
        (ActionEffect::RedCard, ActionTarget::OpponentSlot { slot }) => {
            let sent_off = opponent.take_from_field(slot).ok_or(DuelError::SlotEmpty)?;
            opponent.discard_card(sent_off.card);
        }
        (ActionEffect::YellowCard, ActionTarget::OpponentSlot { slot }) => {
            let booked = opponent.slot_mut(slot).ok_or(DuelError::SlotEmpty)?;
            booked.yellow_cards += 1;
            if booked.yellow_cards >= yellow_card_threshold {
                if let Some(sent_off) = opponent.take_from_field(slot) {
                    opponent.discard_card(sent_off.card);
                }
            }
        }
        (ActionEffect::Var, ActionTarget::None) => {
            issuer.add_modifier(ModifierKind::NextAttackCancelled, ModifierExpiry::UntilConsumed);
        }
        (ActionEffect::Mercato, ActionTarget::None) => {
            // Transfer window: two fresh signings from the player deck.
            for _ in 0..2 {
                issuer.draw_player_card(rng);
            }
        }
        _ => return Err(DuelError::InvalidTarget),
    }
    Ok(())
}

/// Apply a legendary's ability at summon time.
pub fn apply_legendary_ability(
    ability: LegendaryAbility,
    summoner: &mut DuelPlayer,
    opponent: &mut DuelPlayer,
    rng: &mut impl Rng,
) {
    match ability {
        LegendaryAbility::Ronaldo => {
            summoner.add_modifier(ModifierKind::ExtraPonto, ModifierExpiry::UntilConsumed);
        }
        LegendaryAbility::Messi => {
            summoner.grant_moves(2);
        }
        LegendaryAbility::Iniesta => {
            opponent.add_modifier(ModifierKind::TacticsBlocked, ModifierExpiry::TurnEnd);
        }
        LegendaryAbility::Shehata => {
            opponent.add_modifier(ModifierKind::RulesBlocked, ModifierExpiry::TurnEnd);
        }
        LegendaryAbility::Modric => {
            for _ in 0..2 {
                summoner.draw_player_card(rng);
            }
        }
        LegendaryAbility::Yashin => {
            summoner.add_modifier(ModifierKind::NextAttackCancelled, ModifierExpiry::UntilConsumed);
        }
    }
}
