//! Attack/defense resolution.
//!
//! A [`PendingAttack`] accumulates the revealed slots and ponto bonuses of
//! both sides; [`resolve`] is a pure function of those sums. Defense
//! greater than or equal to attack always favors the defender.

use serde_json::json;

/// Running state of the attack currently being resolved.
///
/// Each attack within a turn gets a fresh instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttack {
    pub attacker_id: String,
    /// Attacker field slots revealed this attack, in reveal order.
    pub attacker_slots: Vec<usize>,
    /// Attack ponto bonuses drawn (one mandatory, a second via ExtraPonto).
    pub attack_pontos: Vec<u8>,
    pub attack_sum: u32,
    pub defender_slots: Vec<usize>,
    pub defense_ponto: Option<u8>,
    pub defense_sum: u32,
    /// Reveal budget left to the defender for this defense.
    pub defender_moves_remaining: u8,
}

impl PendingAttack {
    pub fn new(attacker_id: String) -> Self {
        Self {
            attacker_id,
            attacker_slots: Vec::new(),
            attack_pontos: Vec::new(),
            attack_sum: 0,
            defender_slots: Vec::new(),
            defense_ponto: None,
            defense_sum: 0,
            defender_moves_remaining: 0,
        }
    }

    pub fn record_attacker(&mut self, slot: usize, attack_value: u8) {
        self.attacker_slots.push(slot);
        self.attack_sum += u32::from(attack_value);
    }

    pub fn record_attack_ponto(&mut self, bonus: u8) {
        self.attack_pontos.push(bonus);
        self.attack_sum += u32::from(bonus);
    }

    pub fn has_attack_ponto(&self) -> bool {
        !self.attack_pontos.is_empty()
    }

    pub fn record_defender(&mut self, slot: usize, defense_value: u8) {
        self.defender_slots.push(slot);
        self.defense_sum += u32::from(defense_value);
    }

    pub fn record_defense_ponto(&mut self, bonus: u8) {
        self.defense_ponto = Some(bonus);
        self.defense_sum += u32::from(bonus);
    }

    pub fn has_defense_ponto(&self) -> bool {
        self.defense_ponto.is_some()
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "attacker_id": self.attacker_id,
            "attacker_slots": self.attacker_slots,
            "attack_pontos": self.attack_pontos,
            "attack_sum": self.attack_sum,
            "defender_slots": self.defender_slots,
            "defense_ponto": self.defense_ponto,
            "defense_sum": self.defense_sum,
            "defender_moves_remaining": self.defender_moves_remaining
        })
    }
}

/// Outcome of comparing the two sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackResult {
    Goal,
    Save,
}

impl AttackResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Save => "save",
        }
    }
}

/// Resolved attack: the result plus the final attack sum ("damage").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackOutcome {
    pub result: AttackResult,
    pub damage: u32,
}

impl AttackOutcome {
    pub fn is_goal(&self) -> bool {
        self.result == AttackResult::Goal
    }
}

/// Compare the accumulated sums. Ties favor the defender.
pub fn resolve(pending: &PendingAttack) -> AttackOutcome {
    let result = if pending.attack_sum > pending.defense_sum {
        AttackResult::Goal
    } else {
        AttackResult::Save
    };
    AttackOutcome {
        result,
        damage: pending.attack_sum,
    }
}

/// The defender forfeits: defense counts as zero, attacker is awarded the goal.
pub fn forfeit(pending: &PendingAttack) -> AttackOutcome {
    AttackOutcome {
        result: AttackResult::Goal,
        damage: pending.attack_sum,
    }
}

/// A voided attack (NextAttackCancelled): a save with nothing consumed.
pub fn voided() -> AttackOutcome {
    AttackOutcome {
        result: AttackResult::Save,
        damage: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pending(attack: &[u8], ponto: u8, defense: &[u8], defense_ponto: Option<u8>) -> PendingAttack {
        let mut p = PendingAttack::new("p1".to_string());
        for (i, v) in attack.iter().enumerate() {
            p.record_attacker(i, *v);
        }
        p.record_attack_ponto(ponto);
        for (i, v) in defense.iter().enumerate() {
            p.record_defender(i, *v);
        }
        if let Some(b) = defense_ponto {
            p.record_defense_ponto(b);
        }
        p
    }

    #[test]
    fn test_goal_when_attack_greater() {
        // 5 + 2 = 7 against 5: goal with damage 7.
        let p = pending(&[5], 2, &[4], Some(1));
        let outcome = resolve(&p);
        assert_eq!(outcome.result, AttackResult::Goal);
        assert_eq!(outcome.damage, 7);
    }

    #[test]
    fn test_tie_is_a_save() {
        let p = pending(&[3], 1, &[4], None);
        assert_eq!(p.attack_sum, 4);
        assert_eq!(p.defense_sum, 4);
        let outcome = resolve(&p);
        assert_eq!(outcome.result, AttackResult::Save);
    }

    #[test]
    fn test_save_when_defense_greater() {
        let p = pending(&[2], 1, &[5, 3], None);
        assert_eq!(resolve(&p).result, AttackResult::Save);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let p = pending(&[4, 2], 3, &[6], Some(2));
        assert_eq!(resolve(&p), resolve(&p));
    }

    #[test]
    fn test_forfeit_always_goal() {
        let p = pending(&[1], 1, &[6, 6], Some(6));
        let outcome = forfeit(&p);
        assert_eq!(outcome.result, AttackResult::Goal);
        assert_eq!(outcome.damage, 2);
    }

    #[test]
    fn test_voided_attack() {
        let outcome = voided();
        assert_eq!(outcome.result, AttackResult::Save);
        assert_eq!(outcome.damage, 0);
    }

    #[test]
    fn test_reveal_order_preserved() {
        let mut p = PendingAttack::new("p1".to_string());
        p.record_attacker(3, 5);
        p.record_attacker(0, 4);
        assert_eq!(p.attacker_slots, vec![3, 0]);
        assert_eq!(p.attack_sum, 9);
    }
}
