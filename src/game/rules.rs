use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    board::{adjacency, is_valid_position, mills, mills_containing, Position, TOTAL_POSITIONS},
    movegen::{has_any_legal_move, AiMove},
    state::{
        Board, GameEvent, GamePhase, GameState, IntegrityError, PieceCounts, Player,
        VictoryReason, VictoryState,
    },
};

/// 玩家可发起的行动。`Select` 走两步协议：先选子，再点目的地。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GameAction {
    Place { position: Position },
    Select { position: Position },
    Move { from: Position, to: Position },
    Remove { position: Position },
    /// 按当前阶段分派的一次点击。
    Click { position: Position },
}

impl From<AiMove> for GameAction {
    fn from(mv: AiMove) -> Self {
        match mv {
            AiMove::Place { to } => GameAction::Place { position: to },
            AiMove::Move { from, to } => GameAction::Move { from, to },
            AiMove::Remove { position } => GameAction::Remove { position },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    GameFinished,
    NotPlayerTurn,
    InvalidPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    InvalidPosition {
        position: Position,
    },
    PositionOccupied {
        position: Position,
    },
    NotOwnPiece {
        position: Position,
    },
    NotOpponentPiece {
        position: Position,
    },
    NotAdjacent {
        from: Position,
        to: Position,
    },
    ProtectedByMill {
        position: Position,
    },
    NoPiecesRemaining {
        player: Player,
    },
    IllegalTransition {
        from: GamePhase,
        to: GamePhase,
    },
    IntegrityViolation {
        error: IntegrityError,
    },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::GameFinished => f.write_str("The game is over - start a new game"),
            RuleError::NotPlayerTurn => f.write_str("It is not your turn"),
            RuleError::InvalidPhase { actual, .. } => {
                write!(f, "Not allowed now - {}", actual.description())
            }
            RuleError::InvalidPosition { position } => {
                write!(f, "Position {position} is not on the board")
            }
            RuleError::PositionOccupied { .. } => f.write_str("Position already occupied"),
            RuleError::NotOwnPiece { .. } => f.write_str("Select your own piece"),
            RuleError::NotOpponentPiece { .. } => {
                f.write_str("You can only remove opponent's pieces")
            }
            RuleError::NotAdjacent { .. } => f.write_str("Invalid move"),
            RuleError::ProtectedByMill { .. } => {
                f.write_str("Cannot remove piece from a mill unless all pieces are in mills")
            }
            RuleError::NoPiecesRemaining { player } => {
                write!(f, "{player} has no pieces left to place")
            }
            RuleError::IllegalTransition { from, to } => {
                write!(f, "Invalid transition from {from:?} to {to:?}")
            }
            RuleError::IntegrityViolation { error } => write!(f, "Corrupted game state: {error}"),
        }
    }
}

impl std::error::Error for RuleError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        let victory = events.iter().find_map(|event| match event {
            GameEvent::GameWon { winner, reason } => Some(VictoryState {
                winner: *winner,
                reason: *reason,
            }),
            _ => None,
        });
        Self {
            state,
            events,
            victory,
        }
    }

    pub fn mill_formed(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, GameEvent::MillFormed { .. }))
    }
}

/// `pos` 所在的某条成三线是否全部属于 `player`。
pub fn check_mill(board: &Board, pos: Position, player: Player) -> bool {
    mills_containing(pos).any(|mill| mill.iter().all(|&p| board.get(p) == Some(player)))
}

/// 标记 `player` 所有处于成三中的棋子。
pub fn positions_in_mills(board: &Board, player: Player) -> [bool; TOTAL_POSITIONS] {
    let mut in_mill = [false; TOTAL_POSITIONS];
    for mill in mills() {
        if mill.iter().all(|&p| board.get(p) == Some(player)) {
            for &p in mill {
                in_mill[p as usize] = true;
            }
        }
    }
    in_mill
}

/// 能否移除 `owner` 在 `pos` 上的棋子：成三中的子只有在其全部棋子都处于成三时才可移除。
pub fn is_removable(board: &Board, pos: Position, owner: Player) -> bool {
    if board.get(pos) != Some(owner) {
        return false;
    }
    let in_mill = positions_in_mills(board, owner);
    if !in_mill[pos as usize] {
        return true;
    }
    board.owned_by(owner).all(|p| in_mill[p as usize])
}

/// 由计数推导出轮到 `next` 时的阶段。
pub fn derive_phase(remaining: PieceCounts, on_board: PieceCounts, next: Player) -> GamePhase {
    if !remaining.both_zero() {
        GamePhase::Placing
    } else if on_board.get(next) == 3 {
        GamePhase::Flying
    } else {
        GamePhase::Moving
    }
}

/// 即将行动的 `player` 是否已经输了。
pub fn loss_reason(state: &GameState, player: Player) -> Option<VictoryReason> {
    if state.pieces_on_board.get(player) <= 2 && state.pieces_remaining.get(player) == 0 {
        return Some(VictoryReason::TooFewPieces { loser: player });
    }
    if state.phase != GamePhase::Placing
        && !has_any_legal_move(&state.board, player, state.is_flying(player))
    {
        return Some(VictoryReason::Blocked { loser: player });
    }
    None
}

fn turn_message(player: Player, phase: GamePhase) -> String {
    match phase {
        GamePhase::Placing => format!("{player}'s turn - Place a piece"),
        GamePhase::Moving => format!("{player}'s turn - Move a piece"),
        GamePhase::Flying => format!("{player}'s turn - Fly to any position"),
        GamePhase::Removing => format!("{player} formed a mill! Remove an opponent's piece"),
        GamePhase::GameOver => format!("{player} wins!"),
    }
}

/// 规则引擎。所有操作都是纯函数：读入一个快照，返回新的快照或错误。
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn reset() -> GameState {
        GameState::new()
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn ensure_active(state: &GameState) -> Result<Player, RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        Self::ensure_integrity(state)?;
        state.current_player.ok_or(RuleError::IntegrityViolation {
            error: IntegrityError::MissingCurrentPlayer,
        })
    }

    fn ensure_phase(state: &GameState, expected: GamePhase) -> Result<(), RuleError> {
        let matches = state.phase == expected
            || (expected.is_movement() && state.phase.is_movement());
        if !matches {
            return Err(RuleError::InvalidPhase {
                expected,
                actual: state.phase,
            });
        }
        Ok(())
    }

    fn ensure_position(position: Position) -> Result<(), RuleError> {
        if !is_valid_position(position as i64) {
            return Err(RuleError::InvalidPosition { position });
        }
        Ok(())
    }

    fn commit(
        previous: &GameState,
        next: GameState,
        events: Vec<GameEvent>,
    ) -> Result<RuleResolution, RuleError> {
        if !previous.phase.can_transition_to(next.phase) {
            return Err(RuleError::IllegalTransition {
                from: previous.phase,
                to: next.phase,
            });
        }
        debug_assert!(
            next.integrity_check().is_ok(),
            "rule engine produced an inconsistent state: {:?}",
            next.integrity_check()
        );
        Ok(RuleResolution::new(next, events))
    }

    fn declare_victory(
        next: &mut GameState,
        winner: Player,
        reason: VictoryReason,
        events: &mut Vec<GameEvent>,
    ) {
        next.phase = GamePhase::GameOver;
        next.winner = Some(winner);
        next.current_player = None;
        next.selected_position = None;
        next.mill_formed = false;
        next.message = turn_message(winner, GamePhase::GameOver);
        events.push(GameEvent::GameWon { winner, reason });
    }

    /// 把回合交给对手，重新推导阶段并检查对手是否已无路可走。
    fn hand_over(next: &mut GameState, mover: Player, events: &mut Vec<GameEvent>) {
        let incoming = mover.opponent();
        next.current_player = Some(incoming);
        next.selected_position = None;
        next.mill_formed = false;
        next.phase = derive_phase(next.pieces_remaining, next.pieces_on_board, incoming);

        if let Some(reason) = loss_reason(next, incoming) {
            Self::declare_victory(next, mover, reason, events);
            return;
        }

        next.message = turn_message(incoming, next.phase);
        events.push(GameEvent::TurnPassed {
            player: incoming,
            phase: next.phase,
        });
    }

    /// 落子或走子之后的成三分支。
    fn after_landing(
        next: &mut GameState,
        mover: Player,
        landed: Position,
        events: &mut Vec<GameEvent>,
    ) {
        if check_mill(&next.board, landed, mover) {
            events.push(GameEvent::MillFormed {
                player: mover,
                position: landed,
            });
            // 对手棋盘上无子可吃时，成三不产生移除阶段。
            if next.pieces_on_board.get(mover.opponent()) > 0 {
                next.phase = GamePhase::Removing;
                next.mill_formed = true;
                next.selected_position = None;
                next.message = turn_message(mover, GamePhase::Removing);
                return;
            }
        }
        Self::hand_over(next, mover, events);
    }

    pub fn place(state: &GameState, position: Position) -> Result<RuleResolution, RuleError> {
        let player = Self::ensure_active(state)?;
        Self::ensure_phase(state, GamePhase::Placing)?;
        Self::ensure_position(position)?;

        if !state.board.is_empty_at(position) {
            return Err(RuleError::PositionOccupied { position });
        }
        if state.pieces_remaining.get(player) == 0 {
            return Err(RuleError::NoPiecesRemaining { player });
        }

        let mut next = state.clone();
        next.board.set(position, Some(player));
        *next.pieces_remaining.get_mut(player) -= 1;
        *next.pieces_on_board.get_mut(player) += 1;

        let mut events = vec![GameEvent::PiecePlaced { player, position }];
        Self::after_landing(&mut next, player, position, &mut events);
        Self::commit(state, next, events)
    }

    pub fn select_or_move(
        state: &GameState,
        position: Position,
    ) -> Result<RuleResolution, RuleError> {
        let player = Self::ensure_active(state)?;
        Self::ensure_phase(state, GamePhase::Moving)?;
        Self::ensure_position(position)?;

        match state.selected_position {
            None => {
                if state.board.get(position) != Some(player) {
                    return Err(RuleError::NotOwnPiece { position });
                }
                let mut next = state.clone();
                next.selected_position = Some(position);
                next.message = format!("{player}'s turn - Select destination");
                Self::commit(
                    state,
                    next,
                    vec![GameEvent::PieceSelected { player, position }],
                )
            }
            Some(selected) if selected == position => {
                let mut next = state.clone();
                next.selected_position = None;
                next.message = turn_message(player, state.phase);
                Self::commit(state, next, vec![GameEvent::SelectionCleared { player }])
            }
            Some(selected) => Self::move_piece(state, selected, position),
        }
    }

    pub fn move_piece(
        state: &GameState,
        from: Position,
        to: Position,
    ) -> Result<RuleResolution, RuleError> {
        let player = Self::ensure_active(state)?;
        Self::ensure_phase(state, GamePhase::Moving)?;
        Self::ensure_position(from)?;
        Self::ensure_position(to)?;

        if state.board.get(from) != Some(player) {
            return Err(RuleError::NotOwnPiece { position: from });
        }
        if !state.board.is_empty_at(to) {
            return Err(RuleError::PositionOccupied { position: to });
        }
        let flying = state.is_flying(player);
        if !flying && !adjacency(from).contains(&to) {
            return Err(RuleError::NotAdjacent { from, to });
        }

        let mut next = state.clone();
        next.board.set(from, None);
        next.board.set(to, Some(player));
        next.selected_position = None;

        let mut events = vec![GameEvent::PieceMoved {
            player,
            from,
            to,
            flying,
        }];
        Self::after_landing(&mut next, player, to, &mut events);
        Self::commit(state, next, events)
    }

    pub fn remove(state: &GameState, position: Position) -> Result<RuleResolution, RuleError> {
        let player = Self::ensure_active(state)?;
        Self::ensure_phase(state, GamePhase::Removing)?;
        Self::ensure_position(position)?;

        let opponent = player.opponent();
        if state.board.get(position) != Some(opponent) {
            return Err(RuleError::NotOpponentPiece { position });
        }
        if !is_removable(&state.board, position, opponent) {
            return Err(RuleError::ProtectedByMill { position });
        }

        let mut next = state.clone();
        next.board.set(position, None);
        *next.pieces_on_board.get_mut(opponent) -= 1;

        let mut events = vec![GameEvent::PieceRemoved { player, position }];
        if next.pieces_on_board.get(opponent) <= 2 && next.pieces_remaining.get(opponent) == 0 {
            Self::declare_victory(
                &mut next,
                player,
                VictoryReason::TooFewPieces { loser: opponent },
                &mut events,
            );
        } else {
            Self::hand_over(&mut next, player, &mut events);
        }
        Self::commit(state, next, events)
    }

    /// 按阶段分派一次棋盘点击。
    pub fn click(state: &GameState, position: Position) -> Result<RuleResolution, RuleError> {
        match state.phase {
            GamePhase::Placing => Self::place(state, position),
            GamePhase::Moving | GamePhase::Flying => Self::select_or_move(state, position),
            GamePhase::Removing => Self::remove(state, position),
            GamePhase::GameOver => Err(RuleError::GameFinished),
        }
    }

    /// 当前行动方被判定无子可动（由外部编排者调用），对手获胜。
    pub fn declare_blocked(
        state: &GameState,
        blocked: Player,
    ) -> Result<RuleResolution, RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        Self::ensure_integrity(state)?;
        let mut next = state.clone();
        let mut events = Vec::new();
        Self::declare_victory(
            &mut next,
            blocked.opponent(),
            VictoryReason::Blocked { loser: blocked },
            &mut events,
        );
        Self::commit(state, next, events)
    }

    pub fn apply(state: &GameState, action: &GameAction) -> Result<RuleResolution, RuleError> {
        match *action {
            GameAction::Place { position } => Self::place(state, position),
            GameAction::Select { position } => Self::select_or_move(state, position),
            GameAction::Move { from, to } => Self::move_piece(state, from, to),
            GameAction::Remove { position } => Self::remove(state, position),
            GameAction::Click { position } => Self::click(state, position),
        }
    }

    /// 宽松接口：非法行动返回原状态，只更新提示信息。
    pub fn step(state: &GameState, action: &GameAction) -> GameState {
        match Self::apply(state, action) {
            Ok(resolution) => resolution.state,
            Err(error) => state.clone().with_message(error.to_string()),
        }
    }

    /// 试走一步但不提交，供搜索与提示使用。
    pub fn simulate(state: &GameState, mv: &AiMove) -> Result<RuleResolution, RuleError> {
        Self::apply(state, &GameAction::from(*mv))
    }
}
