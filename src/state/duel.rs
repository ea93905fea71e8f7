//! Match session state machine.
//!
//! Tracks one active duel: turn/phase transitions, draw obligations,
//! attack/defense resolution, scoring, and the dual clock. All mutation
//! goes through `&mut self` entry points that validate phase and actor
//! before touching state, so a rejected action leaves the duel unchanged.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::card::{CardFactory, CardId, Deck, DeckType, FIELD_SLOTS};
use super::clock::MatchClock;
use super::combat::{self, AttackOutcome, PendingAttack};
use super::effects::{self, ActionTarget};
use super::player::{Checkpoint, DuelPlayer, ModifierKind};

/// Match configuration handed over by the lobby collaborator.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub turn_time_limit: Duration,
    pub match_time_limit: Duration,
    /// Per-turn action budget.
    pub moves_per_turn: u8,
    /// Mandatory draws at the start of every turn.
    pub draws_per_turn: u8,
    /// Reveal budget granted to the defender per attack.
    pub defense_moves: u8,
    /// Player cards dealt before kick-off (plus one action card).
    pub initial_hand_size: u8,
    pub goal_value: u32,
    pub score_to_win: u32,
    pub yellow_card_threshold: u8,
    pub disconnect_grace: Duration,
    /// Fixed RNG seed for deterministic shuffles (tests, replays).
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            turn_time_limit: Duration::seconds(45),
            match_time_limit: Duration::seconds(600),
            moves_per_turn: 4,
            draws_per_turn: 2,
            defense_moves: 3,
            initial_hand_size: 4,
            goal_value: 1,
            score_to_win: 3,
            yellow_card_threshold: 2,
            disconnect_grace: Duration::seconds(60),
            seed: None,
        }
    }
}

/// Match state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStatus {
    /// Created but players not yet bound. The lobby collaborator holds
    /// matches here; [`Duel::new`] binds both players at once and hands
    /// over at `Starting`.
    #[default]
    Waiting,
    /// Players bound, waiting for kick-off
    Starting,
    /// Match in progress
    Playing,
    /// Match over
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Starting => "starting",
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }

    /// Check if the match can receive actions.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Phases within one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Draw,
    Play,
    Attack,
    Defense,
    /// Post-resolution: the attacker may start another attack or end the turn.
    End,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draw => "draw",
            Self::Play => "play",
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::End => "end",
        }
    }
}

/// Why a finished match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinReason {
    Score,
    Timeout,
    GoldenGoal,
    Surrender,
    Disconnect,
}

impl WinReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Timeout => "timeout",
            Self::GoldenGoal => "golden_goal",
            Self::Surrender => "surrender",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Duel errors. Every rejection leaves the match state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelError {
    WrongPhase,
    NotYourTurn,
    UnknownMatch,
    NotInMatch,
    MatchFinished,
    CardNotFound,
    WrongCardKind,
    WrongPosition,
    SlotOccupied,
    SlotEmpty,
    SlotLocked,
    AlreadyRevealed,
    NoMovesLeft,
    NoDefenseMoves,
    DrawObligationPending,
    EmptyAttack,
    PontoRequired,
    PontoAlreadyDrawn,
    ExtraPontoUnavailable,
    InvalidTarget,
    InvalidDiscardSet,
    TacticsBlocked,
    RulesBlocked,
    DeckEmpty,
}

impl DuelError {
    /// Stable code sent in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::WrongPhase => "wrong_phase",
            Self::NotYourTurn => "not_your_turn",
            Self::UnknownMatch => "unknown_match",
            Self::NotInMatch => "not_in_match",
            Self::MatchFinished => "match_finished",
            Self::CardNotFound => "card_not_found",
            Self::WrongCardKind => "wrong_card_kind",
            Self::WrongPosition => "wrong_position",
            Self::SlotOccupied => "slot_occupied",
            Self::SlotEmpty => "slot_empty",
            Self::SlotLocked => "slot_locked",
            Self::AlreadyRevealed => "already_revealed",
            Self::NoMovesLeft => "no_moves_left",
            Self::NoDefenseMoves => "no_defense_moves",
            Self::DrawObligationPending => "draw_obligation_pending",
            Self::EmptyAttack => "empty_attack",
            Self::PontoRequired => "ponto_required",
            Self::PontoAlreadyDrawn => "ponto_already_drawn",
            Self::ExtraPontoUnavailable => "extra_ponto_unavailable",
            Self::InvalidTarget => "invalid_target",
            Self::InvalidDiscardSet => "invalid_discard_set",
            Self::TacticsBlocked => "tactics_blocked",
            Self::RulesBlocked => "rules_blocked",
            Self::DeckEmpty => "deck_empty",
        }
    }
}

impl std::fmt::Display for DuelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::WrongPhase => "Action not legal in the current phase",
            Self::NotYourTurn => "It's not your turn",
            Self::UnknownMatch => "No such match",
            Self::NotInMatch => "You are not in this match",
            Self::MatchFinished => "Match is over",
            Self::CardNotFound => "Card is not in your hand",
            Self::WrongCardKind => "Card kind cannot be used this way",
            Self::WrongPosition => "Card position not allowed here",
            Self::SlotOccupied => "Field slot is occupied",
            Self::SlotEmpty => "Field slot is empty",
            Self::SlotLocked => "Field slot is locked",
            Self::AlreadyRevealed => "Card is already revealed",
            Self::NoMovesLeft => "No moves remaining this turn",
            Self::NoDefenseMoves => "No defense moves remaining",
            Self::DrawObligationPending => "Mandatory draws not completed",
            Self::EmptyAttack => "No attackers revealed",
            Self::PontoRequired => "An attack ponto must be drawn first",
            Self::PontoAlreadyDrawn => "Ponto already drawn",
            Self::ExtraPontoUnavailable => "No extra ponto available",
            Self::InvalidTarget => "Invalid target for this effect",
            Self::InvalidDiscardSet => "Summon requires two distinct hand cards",
            Self::TacticsBlocked => "Action cards are blocked this turn",
            Self::RulesBlocked => "Legendary summons are blocked this turn",
            Self::DeckEmpty => "Deck is empty",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for DuelError {}

/// Side effects of an accepted mutation that the session layer turns
/// into broadcasts (beyond the implicit `game_update`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    TurnStarted { player_id: String },
    AttackResolved { outcome: AttackOutcome },
    GoldenGoalStarted,
    Finished { winner_id: String, reason: WinReason },
}

/// One active match.
#[derive(Debug, Clone)]
pub struct Duel {
    pub id: String,
    pub status: MatchStatus,
    /// Id of the player who must act. Shifts to the defender during the
    /// defense phase so "is it my turn" is a single check.
    pub current_turn: String,
    pub turn_phase: TurnPhase,
    pub turn_number: u32,
    /// Mandatory draws left before the play phase opens.
    draws_remaining: u8,
    pub clock: MatchClock,
    pub winner: Option<String>,
    pub win_reason: Option<WinReason>,
    home: DuelPlayer,
    away: DuelPlayer,
    pub pending_attack: Option<PendingAttack>,
    config: MatchConfig,
    rng: StdRng,
}

impl Duel {
    /// Bind two players and deal opening hands. The match clock starts at
    /// [`Duel::kick_off`].
    pub fn new(
        id: String,
        home: (String, String),
        away: (String, String),
        config: MatchConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut factory = CardFactory::new();

        let mut build_side = |(pid, name): (String, String), rng: &mut StdRng| {
            let mut player = DuelPlayer::new(
                pid,
                name,
                Deck::new(factory.standard_player_deck(), rng),
                Deck::new(factory.standard_action_deck(), rng),
                Deck::new(factory.standard_ponto_deck(), rng),
            );
            for _ in 0..config.initial_hand_size {
                player.draw_player_card(rng);
            }
            player.draw_action_card(rng);
            player
        };

        let home = build_side(home, &mut rng);
        let away = build_side(away, &mut rng);
        let clock = MatchClock::new(now, config.turn_time_limit, config.match_time_limit);

        Self {
            id,
            status: MatchStatus::Starting,
            current_turn: String::new(),
            turn_phase: TurnPhase::Draw,
            turn_number: 0,
            draws_remaining: 0,
            clock,
            winner: None,
            win_reason: None,
            home,
            away,
            pending_attack: None,
            config,
            rng,
        }
    }

    /// Coin-flip the kick-off and open the first turn.
    pub fn kick_off(&mut self, now: DateTime<Utc>) -> Vec<Notice> {
        debug_assert_eq!(self.status, MatchStatus::Starting);
        self.status = MatchStatus::Playing;
        self.clock = MatchClock::new(now, self.config.turn_time_limit, self.config.match_time_limit);

        let starter = if self.rng.gen_bool(0.5) {
            self.home.id.clone()
        } else {
            self.away.id.clone()
        };
        info!("match {}: kick-off, {} starts", self.id, starter);
        self.begin_turn(starter, now)
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn home(&self) -> &DuelPlayer {
        &self.home
    }

    pub fn away(&self) -> &DuelPlayer {
        &self.away
    }

    pub fn player(&self, player_id: &str) -> Option<&DuelPlayer> {
        if self.home.id == player_id {
            Some(&self.home)
        } else if self.away.id == player_id {
            Some(&self.away)
        } else {
            None
        }
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    pub fn opponent_id(&self, player_id: &str) -> Option<&str> {
        if self.home.id == player_id {
            Some(&self.away.id)
        } else if self.away.id == player_id {
            Some(&self.home.id)
        } else {
            None
        }
    }

    pub fn player_ids(&self) -> [&str; 2] {
        [&self.home.id, &self.away.id]
    }

    fn player_mut(&mut self, player_id: &str) -> Option<&mut DuelPlayer> {
        if self.home.id == player_id {
            Some(&mut self.home)
        } else if self.away.id == player_id {
            Some(&mut self.away)
        } else {
            None
        }
    }

    // --- validation helpers ---

    fn ensure_active(&self) -> Result<(), DuelError> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(DuelError::MatchFinished)
        }
    }

    fn ensure_acting(&self, player_id: &str) -> Result<(), DuelError> {
        self.ensure_active()?;
        if !self.has_player(player_id) {
            return Err(DuelError::NotInMatch);
        }
        if self.current_turn != player_id {
            return Err(DuelError::NotYourTurn);
        }
        Ok(())
    }

    fn ensure_phase(&self, phase: TurnPhase) -> Result<(), DuelError> {
        if self.turn_phase == phase {
            Ok(())
        } else {
            Err(DuelError::WrongPhase)
        }
    }

    // --- draw phase ---

    /// Mandatory draw. Free; the phase auto-advances once the obligation
    /// is met.
    pub fn draw_from_deck(&mut self, player_id: &str, deck: DeckType) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Draw)?;

        let rng = &mut self.rng;
        let side = if self.home.id == player_id {
            &mut self.home
        } else {
            &mut self.away
        };
        let drawn = match deck {
            DeckType::Player => side.draw_player_card(rng),
            DeckType::Action => side.draw_action_card(rng),
        };
        if drawn.is_none() {
            return Err(DuelError::DeckEmpty);
        }

        self.draws_remaining -= 1;
        if self.draws_remaining == 0 {
            self.turn_phase = TurnPhase::Play;
        }
        Ok(Vec::new())
    }

    // --- play phase ---

    /// Place a player card from hand into an empty field slot (1 move).
    pub fn play_card(
        &mut self,
        player_id: &str,
        card_id: CardId,
        slot: usize,
    ) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Play)?;
        if slot >= FIELD_SLOTS {
            return Err(DuelError::InvalidTarget);
        }

        let side = self.player(player_id).ok_or(DuelError::NotInMatch)?;
        let card = side.hand_card(card_id).ok_or(DuelError::CardNotFound)?;
        if !card.is_player() {
            return Err(DuelError::WrongCardKind);
        }
        if card.is_legendary() {
            // Legendaries only enter play through a summon.
            return Err(DuelError::WrongCardKind);
        }
        if side.is_locked(slot) {
            return Err(DuelError::SlotLocked);
        }
        if !side.slot_is_empty(slot) {
            return Err(DuelError::SlotOccupied);
        }
        if side.moves_remaining == 0 {
            return Err(DuelError::NoMovesLeft);
        }

        let side = if self.home.id == player_id {
            &mut self.home
        } else {
            &mut self.away
        };
        let card = side.take_from_hand(card_id).ok_or(DuelError::CardNotFound)?;
        side.place_on_field(slot, card);
        side.spend_move();
        Ok(Vec::new())
    }

    /// Use an action card's effect (1 move). Atomic: on rejection the
    /// card stays in hand and no state changes.
    pub fn use_action_card(
        &mut self,
        player_id: &str,
        card_id: CardId,
        target: ActionTarget,
    ) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Play)?;

        let side = self.player(player_id).ok_or(DuelError::NotInMatch)?;
        if side.has_modifier(ModifierKind::TacticsBlocked) {
            return Err(DuelError::TacticsBlocked);
        }
        let card = side.hand_card(card_id).ok_or(DuelError::CardNotFound)?;
        let effect = card.effect().ok_or(DuelError::WrongCardKind)?;
        if side.moves_remaining == 0 {
            return Err(DuelError::NoMovesLeft);
        }

        let issuer_is_home = self.home.id == player_id;
        let (issuer, opponent) = if issuer_is_home {
            (&mut self.home, &mut self.away)
        } else {
            (&mut self.away, &mut self.home)
        };
        effects::use_action(
            effect,
            target,
            issuer,
            opponent,
            self.config.yellow_card_threshold,
            &mut self.rng,
        )?;

        // Effect resolved: consume the card and the move.
        let card = issuer.take_from_hand(card_id).ok_or(DuelError::CardNotFound)?;
        issuer.discard_card(card);
        issuer.spend_move();
        debug!("match {}: {} used {}", self.id, player_id, effect.as_str());
        Ok(Vec::new())
    }

    /// Summon a legendary: discard exactly two hand cards, place the
    /// legendary, invoke its ability (1 move).
    pub fn summon_legendary(
        &mut self,
        player_id: &str,
        card_id: CardId,
        discard_ids: [CardId; 2],
        slot: usize,
    ) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Play)?;
        if slot >= FIELD_SLOTS {
            return Err(DuelError::InvalidTarget);
        }

        let side = self.player(player_id).ok_or(DuelError::NotInMatch)?;
        if side.has_modifier(ModifierKind::RulesBlocked) {
            return Err(DuelError::RulesBlocked);
        }
        let card = side.hand_card(card_id).ok_or(DuelError::CardNotFound)?;
        let ability = card.legendary.ok_or(DuelError::WrongCardKind)?;
        let [d1, d2] = discard_ids;
        if d1 == d2 || d1 == card_id || d2 == card_id {
            return Err(DuelError::InvalidDiscardSet);
        }
        if !side.has_in_hand(d1) || !side.has_in_hand(d2) {
            return Err(DuelError::InvalidDiscardSet);
        }
        if side.is_locked(slot) {
            return Err(DuelError::SlotLocked);
        }
        if !side.slot_is_empty(slot) {
            return Err(DuelError::SlotOccupied);
        }
        if side.moves_remaining == 0 {
            return Err(DuelError::NoMovesLeft);
        }

        let issuer_is_home = self.home.id == player_id;
        let (summoner, opponent) = if issuer_is_home {
            (&mut self.home, &mut self.away)
        } else {
            (&mut self.away, &mut self.home)
        };
        for discard_id in discard_ids {
            let discarded = summoner
                .take_from_hand(discard_id)
                .ok_or(DuelError::InvalidDiscardSet)?;
            summoner.discard_card(discarded);
        }
        let legendary = summoner.take_from_hand(card_id).ok_or(DuelError::CardNotFound)?;
        summoner.place_on_field(slot, legendary);
        summoner.spend_move();
        effects::apply_legendary_ability(ability, summoner, opponent, &mut self.rng);
        info!("match {}: {} summoned {}", self.id, player_id, ability.as_str());
        Ok(Vec::new())
    }

    // --- attack phase ---

    /// Reveal a face-down FW/MF card (1 move). The first reveal of a turn
    /// (or after a resolution) opens a fresh attack and ends the play
    /// phase; if the defender holds NextAttackCancelled the attack voids
    /// immediately with nothing consumed.
    pub fn reveal_attacker(
        &mut self,
        player_id: &str,
        slot: usize,
    ) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        let opening = match self.turn_phase {
            TurnPhase::Play | TurnPhase::End => true,
            TurnPhase::Attack => false,
            _ => return Err(DuelError::WrongPhase),
        };
        if slot >= FIELD_SLOTS {
            return Err(DuelError::InvalidTarget);
        }

        let side = self.player(player_id).ok_or(DuelError::NotInMatch)?;
        if side.moves_remaining == 0 {
            return Err(DuelError::NoMovesLeft);
        }
        if side.is_locked(slot) {
            return Err(DuelError::SlotLocked);
        }
        let field_card = side.slot(slot).ok_or(DuelError::SlotEmpty)?;
        if field_card.revealed {
            return Err(DuelError::AlreadyRevealed);
        }
        let position = field_card.card.position().ok_or(DuelError::WrongCardKind)?;
        if !position.is_attacking() {
            return Err(DuelError::WrongPosition);
        }
        let attack_value = field_card.card.attack_value();

        if opening {
            // Attack-start checkpoint: a pending cancellation voids the
            // whole attack before anything is revealed or spent.
            let attacker_is_home = self.home.id == player_id;
            let defender = if attacker_is_home {
                &mut self.away
            } else {
                &mut self.home
            };
            defender.expire_at(Checkpoint::AttackStart);
            if defender.consume_modifier(ModifierKind::NextAttackCancelled) {
                info!("match {}: attack by {} voided", self.id, player_id);
                self.turn_phase = TurnPhase::End;
                self.pending_attack = None;
                return Ok(vec![Notice::AttackResolved {
                    outcome: combat::voided(),
                }]);
            }
            self.pending_attack = Some(PendingAttack::new(player_id.to_string()));
            self.turn_phase = TurnPhase::Attack;
        }

        let side = if self.home.id == player_id {
            &mut self.home
        } else {
            &mut self.away
        };
        let slot_card = side.slot_mut(slot).ok_or(DuelError::SlotEmpty)?;
        slot_card.revealed = true;
        side.spend_move();
        let pending = self.pending_attack.as_mut().ok_or(DuelError::WrongPhase)?;
        pending.record_attacker(slot, attack_value);
        Ok(Vec::new())
    }

    /// Draw the attack ponto (mandatory, exactly one) or the optional
    /// defense ponto, depending on the current phase.
    pub fn draw_ponto(&mut self, player_id: &str) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        match self.turn_phase {
            TurnPhase::Attack => {
                let pending = self.pending_attack.as_ref().ok_or(DuelError::WrongPhase)?;
                if pending.has_attack_ponto() {
                    return Err(DuelError::PontoAlreadyDrawn);
                }
                let bonus = self.draw_ponto_card(player_id)?;
                let pending = self.pending_attack.as_mut().ok_or(DuelError::WrongPhase)?;
                pending.record_attack_ponto(bonus);
                Ok(Vec::new())
            }
            TurnPhase::Defense => {
                let pending = self.pending_attack.as_ref().ok_or(DuelError::WrongPhase)?;
                if pending.has_defense_ponto() {
                    return Err(DuelError::PontoAlreadyDrawn);
                }
                let bonus = self.draw_ponto_card(player_id)?;
                let pending = self.pending_attack.as_mut().ok_or(DuelError::WrongPhase)?;
                pending.record_defense_ponto(bonus);
                Ok(Vec::new())
            }
            _ => Err(DuelError::WrongPhase),
        }
    }

    /// Draw a second attack ponto; requires the ExtraPonto modifier and
    /// the mandatory ponto already drawn. Consumes the modifier.
    pub fn draw_extra_ponto(&mut self, player_id: &str) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Attack)?;
        let pending = self.pending_attack.as_ref().ok_or(DuelError::WrongPhase)?;
        if !pending.has_attack_ponto() {
            return Err(DuelError::PontoRequired);
        }
        let side = self.player(player_id).ok_or(DuelError::NotInMatch)?;
        if !side.has_modifier(ModifierKind::ExtraPonto) {
            return Err(DuelError::ExtraPontoUnavailable);
        }

        let bonus = self.draw_ponto_card(player_id)?;
        let side = if self.home.id == player_id {
            &mut self.home
        } else {
            &mut self.away
        };
        side.consume_modifier(ModifierKind::ExtraPonto);
        let pending = self.pending_attack.as_mut().ok_or(DuelError::WrongPhase)?;
        pending.record_attack_ponto(bonus);
        Ok(Vec::new())
    }

    /// Pull one card off the acting player's ponto deck, recording its
    /// bonus and discarding the card itself.
    fn draw_ponto_card(&mut self, player_id: &str) -> Result<u8, DuelError> {
        let rng = &mut self.rng;
        let side = if self.home.id == player_id {
            &mut self.home
        } else {
            &mut self.away
        };
        let card = side.ponto_deck.draw(rng).ok_or(DuelError::DeckEmpty)?;
        let bonus = card.ponto_bonus();
        side.ponto_deck.discard(card);
        Ok(bonus)
    }

    /// Close the attack: hand control to the defender.
    pub fn end_attack_phase(&mut self, player_id: &str) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Attack)?;
        let pending = self.pending_attack.as_ref().ok_or(DuelError::WrongPhase)?;
        if pending.attacker_slots.is_empty() {
            return Err(DuelError::EmptyAttack);
        }
        if !pending.has_attack_ponto() {
            return Err(DuelError::PontoRequired);
        }

        let defender_id = self
            .opponent_id(player_id)
            .ok_or(DuelError::NotInMatch)?
            .to_string();
        let defender = if self.home.id == defender_id {
            &mut self.home
        } else {
            &mut self.away
        };
        defender.expire_at(Checkpoint::DefenseStart);
        let pending = self.pending_attack.as_mut().ok_or(DuelError::WrongPhase)?;
        pending.defender_moves_remaining = self.config.defense_moves;
        self.turn_phase = TurnPhase::Defense;
        self.current_turn = defender_id;
        Ok(Vec::new())
    }

    // --- defense phase ---

    /// Reveal a face-down DF/GK card, bounded by the defense budget.
    pub fn reveal_defender(
        &mut self,
        player_id: &str,
        slot: usize,
    ) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Defense)?;
        if slot >= FIELD_SLOTS {
            return Err(DuelError::InvalidTarget);
        }
        let pending = self.pending_attack.as_ref().ok_or(DuelError::WrongPhase)?;
        if pending.defender_moves_remaining == 0 {
            return Err(DuelError::NoDefenseMoves);
        }

        let side = self.player(player_id).ok_or(DuelError::NotInMatch)?;
        if side.is_locked(slot) {
            return Err(DuelError::SlotLocked);
        }
        let field_card = side.slot(slot).ok_or(DuelError::SlotEmpty)?;
        if field_card.revealed {
            return Err(DuelError::AlreadyRevealed);
        }
        let position = field_card.card.position().ok_or(DuelError::WrongCardKind)?;
        if !position.is_defending() {
            return Err(DuelError::WrongPosition);
        }
        let defense_value = field_card.card.defense_value();

        let side = if self.home.id == player_id {
            &mut self.home
        } else {
            &mut self.away
        };
        let slot_card = side.slot_mut(slot).ok_or(DuelError::SlotEmpty)?;
        slot_card.revealed = true;
        let pending = self.pending_attack.as_mut().ok_or(DuelError::WrongPhase)?;
        pending.record_defender(slot, defense_value);
        pending.defender_moves_remaining -= 1;
        Ok(Vec::new())
    }

    /// Forfeit the defense: defense counts as zero, attacker scores.
    pub fn accept_goal(&mut self, player_id: &str, now: DateTime<Utc>) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Defense)?;
        let pending = self.pending_attack.as_ref().ok_or(DuelError::WrongPhase)?;
        let outcome = combat::forfeit(pending);
        Ok(self.resolve_attack(outcome, now))
    }

    /// Finalize the comparison of the two sums.
    pub fn end_defense(&mut self, player_id: &str, now: DateTime<Utc>) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        self.ensure_phase(TurnPhase::Defense)?;
        let pending = self.pending_attack.as_ref().ok_or(DuelError::WrongPhase)?;
        let outcome = combat::resolve(pending);
        Ok(self.resolve_attack(outcome, now))
    }

    /// Apply a resolved attack: discard every card revealed for it, award
    /// the goal if any, and return control to the original attacker (or
    /// pass the turn when their moves are spent).
    fn resolve_attack(&mut self, outcome: AttackOutcome, now: DateTime<Utc>) -> Vec<Notice> {
        let Some(pending) = self.pending_attack.take() else {
            return Vec::new();
        };
        let attacker_id = pending.attacker_id.clone();
        let attacker_is_home = self.home.id == attacker_id;

        // Consumed cards revert to discard on goal and save alike.
        for slot in &pending.attacker_slots {
            let attacker = if attacker_is_home {
                &mut self.home
            } else {
                &mut self.away
            };
            if let Some(fc) = attacker.take_from_field(*slot) {
                attacker.discard_card(fc.card);
            }
        }
        for slot in &pending.defender_slots {
            let defender = if attacker_is_home {
                &mut self.away
            } else {
                &mut self.home
            };
            if let Some(fc) = defender.take_from_field(*slot) {
                defender.discard_card(fc.card);
            }
        }

        let mut notices = vec![Notice::AttackResolved { outcome }];
        let golden = self.clock.is_golden_goal;
        if outcome.is_goal() {
            let goal_value = self.config.goal_value;
            let attacker = if attacker_is_home {
                &mut self.home
            } else {
                &mut self.away
            };
            attacker.score += goal_value;
            let score = attacker.score;
            info!(
                "match {}: goal by {} (damage {}), score {}",
                self.id, attacker_id, outcome.damage, score
            );
            if golden {
                notices.extend(self.finish(attacker_id, WinReason::GoldenGoal));
                return notices;
            }
            if score >= self.config.score_to_win {
                notices.extend(self.finish(attacker_id, WinReason::Score));
                return notices;
            }
        }

        let moves_left = if attacker_is_home {
            self.home.moves_remaining
        } else {
            self.away.moves_remaining
        };
        self.current_turn = attacker_id;
        if moves_left > 0 {
            self.turn_phase = TurnPhase::End;
        } else {
            notices.extend(self.pass_turn(now));
        }
        notices
    }

    // --- turn hand-over ---

    /// Voluntarily end the turn (from play or end phase).
    pub fn end_turn(&mut self, player_id: &str, now: DateTime<Utc>) -> Result<Vec<Notice>, DuelError> {
        self.ensure_acting(player_id)?;
        match self.turn_phase {
            TurnPhase::Play | TurnPhase::End => Ok(self.pass_turn(now)),
            TurnPhase::Draw => Err(DuelError::DrawObligationPending),
            _ => Err(DuelError::WrongPhase),
        }
    }

    fn pass_turn(&mut self, now: DateTime<Utc>) -> Vec<Notice> {
        let outgoing = self.current_turn.clone();
        if let Some(side) = self.player_mut(&outgoing) {
            side.expire_at(Checkpoint::TurnEnd);
        }
        let next = if self.home.id == outgoing {
            self.away.id.clone()
        } else {
            self.home.id.clone()
        };
        self.begin_turn(next, now)
    }

    fn begin_turn(&mut self, player_id: String, now: DateTime<Utc>) -> Vec<Notice> {
        self.turn_number += 1;
        self.draws_remaining = self.config.draws_per_turn;
        self.turn_phase = if self.draws_remaining == 0 {
            TurnPhase::Play
        } else {
            TurnPhase::Draw
        };
        self.pending_attack = None;
        self.clock.restart_turn(now);
        self.current_turn = player_id.clone();

        let budget = self.config.moves_per_turn;
        let side = if self.home.id == player_id {
            &mut self.home
        } else {
            &mut self.away
        };
        side.expire_at(Checkpoint::TurnStart);
        side.reset_moves(budget);
        debug!("match {}: turn {} for {}", self.id, self.turn_number, player_id);
        vec![Notice::TurnStarted { player_id }]
    }

    // --- surrender / teardown ---

    pub fn surrender(&mut self, player_id: &str) -> Result<Vec<Notice>, DuelError> {
        self.ensure_active()?;
        let winner = self
            .opponent_id(player_id)
            .ok_or(DuelError::NotInMatch)?
            .to_string();
        Ok(self.finish(winner, WinReason::Surrender))
    }

    /// Disconnect grace expired: the remaining player wins.
    pub fn forfeit_disconnected(&mut self, player_id: &str) -> Result<Vec<Notice>, DuelError> {
        self.ensure_active()?;
        let winner = self
            .opponent_id(player_id)
            .ok_or(DuelError::NotInMatch)?
            .to_string();
        Ok(self.finish(winner, WinReason::Disconnect))
    }

    fn finish(&mut self, winner_id: String, reason: WinReason) -> Vec<Notice> {
        self.status = MatchStatus::Finished;
        self.winner = Some(winner_id.clone());
        self.win_reason = Some(reason);
        info!(
            "match {}: finished, winner {} ({})",
            self.id,
            winner_id,
            reason.as_str()
        );
        vec![Notice::Finished { winner_id, reason }]
    }

    // --- timer expiries ---

    /// Turn clock hit zero: force-advance the active phase as if the
    /// acting player had ended it voluntarily, then pass the turn.
    pub fn force_turn_expiry(&mut self, now: DateTime<Utc>) -> Vec<Notice> {
        if !self.status.is_active() {
            return Vec::new();
        }
        info!(
            "match {}: turn clock expired in {} phase",
            self.id,
            self.turn_phase.as_str()
        );
        match self.turn_phase {
            TurnPhase::Draw => {
                // Complete the draw obligation before passing.
                let rng = &mut self.rng;
                let acting = self.current_turn.clone();
                let side = if self.home.id == acting {
                    &mut self.home
                } else {
                    &mut self.away
                };
                while self.draws_remaining > 0 {
                    if side.draw_player_card(rng).is_none() && side.draw_action_card(rng).is_none()
                    {
                        break;
                    }
                    self.draws_remaining -= 1;
                }
                self.pass_turn(now)
            }
            TurnPhase::Play | TurnPhase::End => self.pass_turn(now),
            TurnPhase::Attack => {
                // Abandoned attack: revealed cards discard, counts as a save.
                let Some(pending) = self.pending_attack.take() else {
                    return self.pass_turn(now);
                };
                let attacker_id = pending.attacker_id.clone();
                let attacker_is_home = self.home.id == attacker_id;
                for slot in &pending.attacker_slots {
                    let attacker = if attacker_is_home {
                        &mut self.home
                    } else {
                        &mut self.away
                    };
                    if let Some(fc) = attacker.take_from_field(*slot) {
                        attacker.discard_card(fc.card);
                    }
                }
                let mut notices = vec![Notice::AttackResolved {
                    outcome: combat::voided(),
                }];
                self.current_turn = attacker_id;
                notices.extend(self.pass_turn(now));
                notices
            }
            TurnPhase::Defense => {
                let Some(pending) = self.pending_attack.as_ref() else {
                    return self.pass_turn(now);
                };
                let attacker_id = pending.attacker_id.clone();
                let outcome = combat::resolve(pending);
                let mut notices = self.resolve_attack(outcome, now);
                if self.status.is_active() && self.turn_phase == TurnPhase::End {
                    // The clock already ran out; the attacker gets no
                    // follow-up attack.
                    self.current_turn = attacker_id;
                    notices.extend(self.pass_turn(now));
                }
                notices
            }
        }
    }

    /// Match clock hit zero: decide by score, or enter golden goal on a tie.
    pub fn force_match_expiry(&mut self) -> Vec<Notice> {
        if !self.status.is_active() || self.clock.is_golden_goal {
            return Vec::new();
        }
        let (home_score, away_score) = (self.home.score, self.away.score);
        if home_score != away_score {
            let winner = if home_score > away_score {
                self.home.id.clone()
            } else {
                self.away.id.clone()
            };
            self.finish(winner, WinReason::Timeout)
        } else {
            info!("match {}: tied at full time, golden goal", self.id);
            self.clock.enter_golden_goal();
            vec![Notice::GoldenGoalStarted]
        }
    }

    /// Full state snapshot, stamped with the server's clock.
    pub fn to_json(&self, now: DateTime<Utc>) -> serde_json::Value {
        serde_json::json!({
            "match_id": self.id,
            "status": self.status.as_str(),
            "current_turn": if self.current_turn.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::json!(self.current_turn)
            },
            "turn_phase": self.turn_phase.as_str(),
            "turn_number": self.turn_number,
            "draws_remaining": self.draws_remaining,
            "clock": self.clock.to_json(now),
            "winner": self.winner,
            "win_reason": self.win_reason.map(|r| r.as_str()),
            "players": [self.home.to_json(), self.away.to_json()],
            "pending_attack": self.pending_attack.as_ref().map(|p| p.to_json()),
            "server_time": now.timestamp_millis()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::card::{ActionEffect, CardKind, FieldPosition, LegendaryAbility};
    use crate::state::combat::AttackResult;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).unwrap()
    }

    fn config() -> MatchConfig {
        MatchConfig {
            seed: Some(42),
            ..MatchConfig::default()
        }
    }

    fn started_duel() -> Duel {
        let mut duel = Duel::new(
            "m1".to_string(),
            ("p1".to_string(), "Alice".to_string()),
            ("p2".to_string(), "Bruno".to_string()),
            config(),
            t0(),
        );
        duel.kick_off(t0());
        duel
    }

    /// Complete the acting player's draw obligation.
    fn complete_draws(duel: &mut Duel) {
        let acting = duel.current_turn.clone();
        while duel.turn_phase == TurnPhase::Draw {
            duel.draw_from_deck(&acting, DeckType::Player).unwrap();
        }
    }

    fn acting(duel: &Duel) -> String {
        duel.current_turn.clone()
    }

    /// Find a hand card by predicate for the given player.
    fn hand_card_where(duel: &Duel, player_id: &str, pred: impl Fn(&CardKind) -> bool) -> Option<CardId> {
        duel.player(player_id)
            .unwrap()
            .hand()
            .iter()
            .find(|c| pred(&c.kind))
            .map(|c| c.id)
    }

    /// Drive the duel to the play phase and plant a face-down attacker
    /// and defender via direct state access in tests below.
    #[test]
    fn test_kick_off_opens_draw_phase() {
        let duel = started_duel();
        assert_eq!(duel.status, MatchStatus::Playing);
        assert_eq!(duel.turn_phase, TurnPhase::Draw);
        assert_eq!(duel.turn_number, 1);
        assert!(duel.has_player(&duel.current_turn));
        // Opening hands: N player cards + 1 action card.
        assert_eq!(duel.home().hand().len(), 5);
        assert_eq!(duel.away().hand().len(), 5);
    }

    #[test]
    fn test_draw_obligation_advances_phase() {
        let mut duel = started_duel();
        let actor = acting(&duel);

        duel.draw_from_deck(&actor, DeckType::Player).unwrap();
        assert_eq!(duel.turn_phase, TurnPhase::Draw);
        duel.draw_from_deck(&actor, DeckType::Action).unwrap();
        assert_eq!(duel.turn_phase, TurnPhase::Play);

        // Obligation met: further deck draws are out of phase.
        let err = duel.draw_from_deck(&actor, DeckType::Player).unwrap_err();
        assert_eq!(err, DuelError::WrongPhase);
    }

    #[test]
    fn test_draw_is_free() {
        let mut duel = started_duel();
        let actor = acting(&duel);
        let moves_before = duel.player(&actor).unwrap().moves_remaining;
        duel.draw_from_deck(&actor, DeckType::Player).unwrap();
        assert_eq!(duel.player(&actor).unwrap().moves_remaining, moves_before);
    }

    #[test]
    fn test_wrong_actor_rejected() {
        let mut duel = started_duel();
        let actor = acting(&duel);
        let other = duel.opponent_id(&actor).unwrap().to_string();

        let err = duel.draw_from_deck(&other, DeckType::Player).unwrap_err();
        assert_eq!(err, DuelError::NotYourTurn);

        let err = duel.draw_from_deck("ghost", DeckType::Player).unwrap_err();
        assert_eq!(err, DuelError::NotInMatch);
    }

    #[test]
    fn test_play_card_costs_a_move() {
        let mut duel = started_duel();
        let actor = acting(&duel);
        complete_draws(&mut duel);

        let card_id = hand_card_where(&duel, &actor, |k| matches!(k, CardKind::Player { .. }))
            .expect("player card in hand");
        // Legendaries are summon-only; re-pick if we landed on one.
        let card_id = if duel.player(&actor).unwrap().hand_card(card_id).unwrap().is_legendary() {
            duel.player(&actor)
                .unwrap()
                .hand()
                .iter()
                .find(|c| c.is_player() && !c.is_legendary())
                .map(|c| c.id)
                .expect("non-legendary player card")
        } else {
            card_id
        };

        let moves_before = duel.player(&actor).unwrap().moves_remaining;
        duel.play_card(&actor, card_id, 0).unwrap();

        let side = duel.player(&actor).unwrap();
        assert!(side.slot(0).is_some());
        assert!(!side.slot(0).unwrap().revealed);
        assert_eq!(side.moves_remaining, moves_before - 1);

        // Occupied slot is rejected.
        if let Some(other) = side
            .hand()
            .iter()
            .find(|c| c.is_player() && !c.is_legendary())
            .map(|c| c.id)
        {
            let err = duel.play_card(&actor, other, 0).unwrap_err();
            assert_eq!(err, DuelError::SlotOccupied);
        }
    }

    #[test]
    fn test_reveal_defender_outside_defense_rejected() {
        let mut duel = started_duel();
        let actor = acting(&duel);
        complete_draws(&mut duel);

        let snapshot = duel.to_json(t0());
        let err = duel.reveal_defender(&actor, 0).unwrap_err();
        assert_eq!(err, DuelError::WrongPhase);
        // State unchanged by the rejection.
        assert_eq!(duel.to_json(t0()), snapshot);
    }

    #[test]
    fn test_full_attack_goal_flow() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        let defender = duel.opponent_id(&attacker).unwrap().to_string();
        complete_draws(&mut duel);

        // Plant a strong attacker and a weak defender directly.
        let mut factory = CardFactory::new();
        let fw = factory.player("test-fw", FieldPosition::Fw, 6, 1);
        duel.player_mut(&attacker).unwrap().place_on_field(0, fw);
        let df = factory.player("test-df", FieldPosition::Df, 1, 2);
        duel.player_mut(&defender).unwrap().place_on_field(1, df);

        duel.reveal_attacker(&attacker, 0).unwrap();
        assert_eq!(duel.turn_phase, TurnPhase::Attack);

        // Must draw the ponto before ending the attack.
        let err = duel.end_attack_phase(&attacker).unwrap_err();
        assert_eq!(err, DuelError::PontoRequired);
        duel.draw_ponto(&attacker).unwrap();
        let err = duel.draw_ponto(&attacker).unwrap_err();
        assert_eq!(err, DuelError::PontoAlreadyDrawn);

        duel.end_attack_phase(&attacker).unwrap();
        assert_eq!(duel.turn_phase, TurnPhase::Defense);
        assert_eq!(duel.current_turn, defender);

        duel.reveal_defender(&defender, 1).unwrap();
        let attack_sum = duel.pending_attack.as_ref().unwrap().attack_sum;
        let defense_sum = duel.pending_attack.as_ref().unwrap().defense_sum;
        let notices = duel.end_defense(&defender, t0()).unwrap();

        let resolved = notices.iter().find_map(|n| match n {
            Notice::AttackResolved { outcome } => Some(*outcome),
            _ => None,
        });
        let outcome = resolved.expect("attack resolved");
        if attack_sum > defense_sum {
            assert_eq!(outcome.result, AttackResult::Goal);
            assert_eq!(outcome.damage, attack_sum);
            assert_eq!(duel.player(&attacker).unwrap().score, 1);
        } else {
            assert_eq!(outcome.result, AttackResult::Save);
            assert_eq!(duel.player(&attacker).unwrap().score, 0);
        }

        // Consumed cards left the field.
        assert!(duel.player(&attacker).unwrap().slot_is_empty(0));
        assert!(duel.player(&defender).unwrap().slot_is_empty(1));
        // Control back with the attacker, who still has moves.
        assert_eq!(duel.current_turn, attacker);
        assert_eq!(duel.turn_phase, TurnPhase::End);
        assert!(duel.pending_attack.is_none());
    }

    #[test]
    fn test_tie_is_save_no_score_change() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        let defender = duel.opponent_id(&attacker).unwrap().to_string();
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        let fw = factory.player("fw", FieldPosition::Fw, 3, 1);
        duel.player_mut(&attacker).unwrap().place_on_field(0, fw);
        let df = factory.player("df", FieldPosition::Df, 1, 4);
        duel.player_mut(&defender).unwrap().place_on_field(0, df);

        duel.reveal_attacker(&attacker, 0).unwrap();
        duel.draw_ponto(&attacker).unwrap();
        // Pin the sums to a tie regardless of the drawn ponto.
        {
            let pending = duel.pending_attack.as_mut().unwrap();
            pending.attack_sum = 4;
        }
        duel.end_attack_phase(&attacker).unwrap();
        duel.reveal_defender(&defender, 0).unwrap();

        let notices = duel.end_defense(&defender, t0()).unwrap();
        let outcome = notices
            .iter()
            .find_map(|n| match n {
                Notice::AttackResolved { outcome } => Some(*outcome),
                _ => None,
            })
            .unwrap();
        assert_eq!(outcome.result, AttackResult::Save);
        assert_eq!(duel.player(&attacker).unwrap().score, 0);
        assert_eq!(duel.player(&defender).unwrap().score, 0);
    }

    #[test]
    fn test_accept_goal_awards_attacker() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        let defender = duel.opponent_id(&attacker).unwrap().to_string();
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        let fw = factory.player("fw", FieldPosition::Fw, 2, 1);
        duel.player_mut(&attacker).unwrap().place_on_field(0, fw);

        duel.reveal_attacker(&attacker, 0).unwrap();
        duel.draw_ponto(&attacker).unwrap();
        duel.end_attack_phase(&attacker).unwrap();

        duel.accept_goal(&defender, t0()).unwrap();
        assert_eq!(duel.player(&attacker).unwrap().score, 1);
    }

    #[test]
    fn test_extra_ponto_requires_mandatory_draw_first() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        duel.player_mut(&attacker)
            .unwrap()
            .place_on_field(0, factory.player("fw", FieldPosition::Fw, 5, 1));
        duel.player_mut(&attacker).unwrap().add_modifier(
            ModifierKind::ExtraPonto,
            crate::state::player::ModifierExpiry::UntilConsumed,
        );
        duel.reveal_attacker(&attacker, 0).unwrap();

        let err = duel.draw_extra_ponto(&attacker).unwrap_err();
        assert_eq!(err, DuelError::PontoRequired);
        // The modifier survives the rejection.
        assert!(duel
            .player(&attacker)
            .unwrap()
            .has_modifier(ModifierKind::ExtraPonto));
    }

    #[test]
    fn test_extra_ponto_draws_once_and_consumes_modifier() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        duel.player_mut(&attacker)
            .unwrap()
            .place_on_field(0, factory.player("fw", FieldPosition::Fw, 5, 1));
        duel.reveal_attacker(&attacker, 0).unwrap();
        duel.draw_ponto(&attacker).unwrap();

        // Without the modifier the second draw is rejected outright.
        let err = duel.draw_extra_ponto(&attacker).unwrap_err();
        assert_eq!(err, DuelError::ExtraPontoUnavailable);

        duel.player_mut(&attacker).unwrap().add_modifier(
            ModifierKind::ExtraPonto,
            crate::state::player::ModifierExpiry::UntilConsumed,
        );
        duel.draw_extra_ponto(&attacker).unwrap();

        let pending = duel.pending_attack.as_ref().unwrap();
        assert_eq!(pending.attack_pontos.len(), 2);
        let bonus_sum: u32 = pending.attack_pontos.iter().map(|b| u32::from(*b)).sum();
        assert_eq!(pending.attack_sum, 5 + bonus_sum);
        assert!(!duel
            .player(&attacker)
            .unwrap()
            .has_modifier(ModifierKind::ExtraPonto));

        // One extra per grant.
        let err = duel.draw_extra_ponto(&attacker).unwrap_err();
        assert_eq!(err, DuelError::ExtraPontoUnavailable);
    }

    #[test]
    fn test_voluntary_end_turn() {
        let mut duel = started_duel();
        let first = acting(&duel);
        let second = duel.opponent_id(&first).unwrap().to_string();

        // The draw obligation must be met before the turn can end.
        let err = duel.end_turn(&first, t0()).unwrap_err();
        assert_eq!(err, DuelError::DrawObligationPending);

        complete_draws(&mut duel);
        let moves_before = duel.player(&first).unwrap().moves_remaining;
        let notices = duel.end_turn(&first, t0()).unwrap();

        assert!(matches!(&notices[0], Notice::TurnStarted { player_id } if *player_id == second));
        assert_eq!(duel.current_turn, second);
        assert_eq!(duel.turn_phase, TurnPhase::Draw);
        assert_eq!(duel.turn_number, 2);
        // Ending the turn consumes no move.
        assert_eq!(duel.player(&first).unwrap().moves_remaining, moves_before);
    }

    #[test]
    fn test_var_voids_next_attack() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        let defender = duel.opponent_id(&attacker).unwrap().to_string();
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        let fw = factory.player("fw", FieldPosition::Fw, 6, 1);
        duel.player_mut(&attacker).unwrap().place_on_field(0, fw);
        duel.player_mut(&defender)
            .unwrap()
            .add_modifier(ModifierKind::NextAttackCancelled, crate::state::player::ModifierExpiry::UntilConsumed);

        let notices = duel.reveal_attacker(&attacker, 0).unwrap();
        let outcome = notices
            .iter()
            .find_map(|n| match n {
                Notice::AttackResolved { outcome } => Some(*outcome),
                _ => None,
            })
            .unwrap();
        assert_eq!(outcome.result, AttackResult::Save);
        assert_eq!(outcome.damage, 0);

        // Nothing consumed: card still face-down on the field, flag cleared.
        let side = duel.player(&attacker).unwrap();
        assert!(!side.slot(0).unwrap().revealed);
        assert!(!duel
            .player(&defender)
            .unwrap()
            .has_modifier(ModifierKind::NextAttackCancelled));
        assert_eq!(duel.turn_phase, TurnPhase::End);

        // The next attack proceeds normally.
        duel.reveal_attacker(&attacker, 0).unwrap();
        assert_eq!(duel.turn_phase, TurnPhase::Attack);
    }

    #[test]
    fn test_summon_round_trip_and_invalid_sets() {
        let mut duel = started_duel();
        let actor = acting(&duel);
        complete_draws(&mut duel);

        // Give the actor a legendary plus two fodder cards.
        let mut factory = CardFactory::new();
        let legendary = factory.legendary("messi", FieldPosition::Fw, 7, 2, LegendaryAbility::Messi);
        let legendary_id = legendary.id;
        let fodder1 = factory.player("f1", FieldPosition::Df, 1, 2);
        let fodder1_id = fodder1.id;
        let fodder2 = factory.action(ActionEffect::Var);
        let fodder2_id = fodder2.id;
        {
            let side = duel.player_mut(&actor).unwrap();
            side.add_to_hand(legendary);
            side.add_to_hand(fodder1);
            side.add_to_hand(fodder2);
        }

        let hand_before = duel.player(&actor).unwrap().hand().len();
        let field_before: Vec<bool> = duel
            .player(&actor)
            .unwrap()
            .field()
            .iter()
            .map(|s| s.is_some())
            .collect();

        // Duplicate discard ids rejected, state byte-for-byte unchanged.
        let err = duel
            .summon_legendary(&actor, legendary_id, [fodder1_id, fodder1_id], 3)
            .unwrap_err();
        assert_eq!(err, DuelError::InvalidDiscardSet);
        assert_eq!(duel.player(&actor).unwrap().hand().len(), hand_before);
        let field_after: Vec<bool> = duel
            .player(&actor)
            .unwrap()
            .field()
            .iter()
            .map(|s| s.is_some())
            .collect();
        assert_eq!(field_after, field_before);

        // Valid summon: two cards leave the hand, one card hits the field.
        let moves_before = duel.player(&actor).unwrap().moves_remaining;
        duel.summon_legendary(&actor, legendary_id, [fodder1_id, fodder2_id], 3)
            .unwrap();
        let side = duel.player(&actor).unwrap();
        assert_eq!(side.hand().len(), hand_before - 3);
        assert_eq!(side.slot(3).unwrap().card.id, legendary_id);
        // Messi's ability refunds the summon cost and more.
        assert_eq!(side.moves_remaining, moves_before - 1 + 2);
    }

    #[test]
    fn test_multiple_attacks_fresh_pending() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        let defender = duel.opponent_id(&attacker).unwrap().to_string();
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        duel.player_mut(&attacker)
            .unwrap()
            .place_on_field(0, factory.player("fw1", FieldPosition::Fw, 2, 1));
        duel.player_mut(&attacker)
            .unwrap()
            .place_on_field(1, factory.player("fw2", FieldPosition::Fw, 3, 1));

        duel.reveal_attacker(&attacker, 0).unwrap();
        duel.draw_ponto(&attacker).unwrap();
        duel.end_attack_phase(&attacker).unwrap();
        duel.end_defense(&defender, t0()).unwrap();

        // Second attack from the end phase starts clean.
        assert_eq!(duel.turn_phase, TurnPhase::End);
        duel.reveal_attacker(&attacker, 1).unwrap();
        let pending = duel.pending_attack.as_ref().unwrap();
        assert_eq!(pending.attacker_slots, vec![1]);
        assert!(!pending.has_attack_ponto());
    }

    #[test]
    fn test_surrender() {
        let mut duel = started_duel();
        let loser = acting(&duel);
        let winner = duel.opponent_id(&loser).unwrap().to_string();

        let notices = duel.surrender(&loser).unwrap();
        assert_eq!(
            notices,
            vec![Notice::Finished {
                winner_id: winner,
                reason: WinReason::Surrender
            }]
        );
        assert!(duel.status.is_terminal());

        // Post-teardown actions are rejected.
        let err = duel.draw_from_deck(&loser, DeckType::Player).unwrap_err();
        assert_eq!(err, DuelError::MatchFinished);
    }

    #[test]
    fn test_turn_expiry_passes_turn() {
        let mut duel = started_duel();
        let first = acting(&duel);
        let second = duel.opponent_id(&first).unwrap().to_string();

        // Expire during the draw phase: obligation auto-completed.
        let hand_before = duel.player(&first).unwrap().hand().len();
        let notices = duel.force_turn_expiry(t0() + Duration::seconds(45));
        assert_eq!(duel.player(&first).unwrap().hand().len(), hand_before + 2);
        assert_eq!(duel.current_turn, second);
        assert_eq!(duel.turn_phase, TurnPhase::Draw);
        assert_eq!(duel.turn_number, 2);
        assert!(matches!(&notices[0], Notice::TurnStarted { player_id } if *player_id == second));
    }

    #[test]
    fn test_turn_expiry_abandons_open_attack() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        duel.player_mut(&attacker)
            .unwrap()
            .place_on_field(0, factory.player("fw", FieldPosition::Fw, 5, 1));
        duel.reveal_attacker(&attacker, 0).unwrap();

        let notices = duel.force_turn_expiry(t0() + Duration::seconds(45));
        let outcome = notices
            .iter()
            .find_map(|n| match n {
                Notice::AttackResolved { outcome } => Some(*outcome),
                _ => None,
            })
            .unwrap();
        assert_eq!(outcome.result, AttackResult::Save);
        // Revealed attacker was consumed.
        assert!(duel.player(&attacker).unwrap().slot_is_empty(0));
        assert_ne!(duel.current_turn, attacker);
    }

    #[test]
    fn test_match_expiry_scores_differ() {
        let mut duel = started_duel();
        let leader = duel.home().id.clone();
        duel.player_mut(&leader).unwrap().score = 2;

        let notices = duel.force_match_expiry();
        assert_eq!(
            notices,
            vec![Notice::Finished {
                winner_id: leader,
                reason: WinReason::Timeout
            }]
        );
    }

    #[test]
    fn test_match_expiry_tie_enters_golden_goal() {
        let mut duel = started_duel();
        duel.home.score = 2;
        duel.away.score = 2;

        let notices = duel.force_match_expiry();
        assert_eq!(notices, vec![Notice::GoldenGoalStarted]);
        assert!(duel.clock.is_golden_goal);
        assert!(duel.status.is_active());

        // A second match expiry is a no-op: the clock is spent.
        assert!(duel.force_match_expiry().is_empty());
    }

    #[test]
    fn test_golden_goal_ends_match_on_next_goal() {
        let mut duel = started_duel();
        duel.home.score = 2;
        duel.away.score = 2;
        duel.force_match_expiry();

        let attacker = acting(&duel);
        let defender = duel.opponent_id(&attacker).unwrap().to_string();
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        duel.player_mut(&attacker)
            .unwrap()
            .place_on_field(0, factory.player("fw", FieldPosition::Fw, 6, 1));
        duel.reveal_attacker(&attacker, 0).unwrap();
        duel.draw_ponto(&attacker).unwrap();
        duel.end_attack_phase(&attacker).unwrap();
        let notices = duel.accept_goal(&defender, t0()).unwrap();

        assert!(notices.iter().any(|n| matches!(
            n,
            Notice::Finished { winner_id, reason: WinReason::GoldenGoal } if *winner_id == attacker
        )));
        assert!(duel.status.is_terminal());
    }

    #[test]
    fn test_defense_budget_bounds_reveals() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        let defender = duel.opponent_id(&attacker).unwrap().to_string();
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        duel.player_mut(&attacker)
            .unwrap()
            .place_on_field(0, factory.player("fw", FieldPosition::Fw, 5, 1));
        for slot in 0..4 {
            let df = factory.player("df", FieldPosition::Df, 1, 3);
            duel.player_mut(&defender).unwrap().place_on_field(slot, df);
        }

        duel.reveal_attacker(&attacker, 0).unwrap();
        duel.draw_ponto(&attacker).unwrap();
        duel.end_attack_phase(&attacker).unwrap();

        for slot in 0..3 {
            duel.reveal_defender(&defender, slot).unwrap();
        }
        let err = duel.reveal_defender(&defender, 3).unwrap_err();
        assert_eq!(err, DuelError::NoDefenseMoves);
    }

    #[test]
    fn test_locked_slot_cannot_be_revealed() {
        let mut duel = started_duel();
        let attacker = acting(&duel);
        complete_draws(&mut duel);

        let mut factory = CardFactory::new();
        duel.player_mut(&attacker)
            .unwrap()
            .place_on_field(0, factory.player("fw", FieldPosition::Fw, 5, 1));
        duel.player_mut(&attacker).unwrap().lock_slot(0);

        let err = duel.reveal_attacker(&attacker, 0).unwrap_err();
        assert_eq!(err, DuelError::SlotLocked);
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(DuelError::WrongPhase.code(), "wrong_phase");
        assert_eq!(DuelError::NotYourTurn.code(), "not_your_turn");
        assert_eq!(DuelError::InvalidDiscardSet.code(), "invalid_discard_set");
        assert_eq!(DuelError::TacticsBlocked.code(), "tactics_blocked");
    }
}
