use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::board::{Position, PIECES_PER_PLAYER, TOTAL_POSITIONS};

/// 玩家（白方先手）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    White,
    Black,
}

impl Player {
    pub fn opponent(self) -> Player {
        match self {
            Player::White => Player::Black,
            Player::Black => Player::White,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Player::White => "White",
            Player::Black => "Black",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Player {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Player::White),
            "black" | "b" => Ok(Player::Black),
            _ => Err(()),
        }
    }
}

/// 24 个点位到 {空, 白, 黑} 的映射。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct Board {
    cells: [Option<Player>; TOTAL_POSITIONS],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 越界点位视为空。
    pub fn get(&self, pos: Position) -> Option<Player> {
        self.cells.get(pos as usize).copied().flatten()
    }

    pub fn set(&mut self, pos: Position, cell: Option<Player>) {
        if let Some(slot) = self.cells.get_mut(pos as usize) {
            *slot = cell;
        }
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        (pos as usize) < TOTAL_POSITIONS && self.cells[pos as usize].is_none()
    }

    pub fn owned_by(&self, player: Player) -> impl Iterator<Item = Position> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, cell)| **cell == Some(player))
            .map(|(pos, _)| pos as Position)
    }

    pub fn empty_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(pos, _)| pos as Position)
    }

    pub fn count(&self, player: Player) -> u8 {
        self.cells.iter().filter(|cell| **cell == Some(player)).count() as u8
    }

    pub fn occupied(&self) -> u8 {
        self.cells.iter().filter(|cell| cell.is_some()).count() as u8
    }

    /// 由形如 `[(0, White), (1, Black)]` 的列表构造棋盘，测试与调试用。
    pub fn from_pieces(pieces: &[(Position, Player)]) -> Self {
        let mut board = Board::empty();
        for &(pos, player) in pieces {
            board.set(pos, Some(player));
        }
        board
    }
}

/// 按玩家区分的计数。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct PieceCounts {
    pub white: u8,
    pub black: u8,
}

impl PieceCounts {
    pub fn new(white: u8, black: u8) -> Self {
        Self { white, black }
    }

    pub fn get(&self, player: Player) -> u8 {
        match player {
            Player::White => self.white,
            Player::Black => self.black,
        }
    }

    pub fn get_mut(&mut self, player: Player) -> &mut u8 {
        match player {
            Player::White => &mut self.white,
            Player::Black => &mut self.black,
        }
    }

    pub fn both_zero(&self) -> bool {
        self.white == 0 && self.black == 0
    }
}

/// 行动种类，供前端判断当前阶段可做什么。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Place,
    Select,
    Move,
    Remove,
    Reset,
}

/// 游戏阶段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    #[default]
    Placing,
    Moving,
    Flying,
    Removing,
    GameOver,
}

impl GamePhase {
    pub fn allowed_transitions(self) -> &'static [GamePhase] {
        use GamePhase::*;
        match self {
            Placing => &[Removing, Moving, Flying, GameOver],
            Moving => &[Removing, Flying, GameOver],
            Flying => &[Removing, Moving, GameOver],
            Removing => &[Placing, Moving, Flying, GameOver],
            GameOver => &[Placing],
        }
    }

    /// 停留在同一阶段总是合法的。
    pub fn can_transition_to(self, target: GamePhase) -> bool {
        self == target || self.allowed_transitions().contains(&target)
    }

    pub fn allowed_actions(self) -> &'static [ActionKind] {
        match self {
            GamePhase::Placing => &[ActionKind::Place],
            GamePhase::Moving | GamePhase::Flying => &[ActionKind::Select, ActionKind::Move],
            GamePhase::Removing => &[ActionKind::Remove],
            GamePhase::GameOver => &[ActionKind::Reset],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GamePhase::Placing => "Place your pieces on the board",
            GamePhase::Moving => "Move your pieces to adjacent positions",
            GamePhase::Flying => "Fly to any empty position",
            GamePhase::Removing => "Remove an opponent's piece",
            GamePhase::GameOver => "Game Over",
        }
    }

    pub fn is_movement(self) -> bool {
        matches!(self, GamePhase::Moving | GamePhase::Flying)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum VictoryReason {
    TooFewPieces { loser: Player },
    Blocked { loser: Player },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictoryState {
    pub winner: Player,
    pub reason: VictoryReason,
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    PiecePlaced {
        player: Player,
        position: Position,
    },
    PieceSelected {
        player: Player,
        position: Position,
    },
    SelectionCleared {
        player: Player,
    },
    PieceMoved {
        player: Player,
        from: Position,
        to: Position,
        flying: bool,
    },
    MillFormed {
        player: Player,
        position: Position,
    },
    PieceRemoved {
        player: Player,
        position: Position,
    },
    TurnPassed {
        player: Player,
        phase: GamePhase,
    },
    GameWon {
        winner: Player,
        reason: VictoryReason,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    PieceCountMismatch {
        player: Player,
        recorded: u8,
        actual: u8,
    },
    PieceCountOverflow {
        player: Player,
    },
    InvalidSelection {
        position: Position,
    },
    MissingCurrentPlayer,
    FlyingWithoutThreePieces {
        player: Player,
    },
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::PieceCountMismatch {
                player,
                recorded,
                actual,
            } => write!(
                f,
                "{player} is recorded with {recorded} pieces on board but has {actual}"
            ),
            IntegrityError::PieceCountOverflow { player } => {
                write!(f, "{player} has more than {PIECES_PER_PLAYER} pieces")
            }
            IntegrityError::InvalidSelection { position } => {
                write!(f, "selected position {position} is not a piece of the mover")
            }
            IntegrityError::MissingCurrentPlayer => {
                f.write_str("no current player outside of game over")
            }
            IntegrityError::FlyingWithoutThreePieces { player } => {
                write!(f, "{player} is flying without exactly three pieces")
            }
        }
    }
}

/// 游戏整体状态。每次行动都会产生一个新的快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub board: Board,
    pub current_player: Option<Player>,
    pub phase: GamePhase,
    pub pieces_remaining: PieceCounts,
    pub pieces_on_board: PieceCounts,
    #[serde(default)]
    pub selected_position: Option<Position>,
    #[serde(default)]
    pub mill_formed: bool,
    #[serde(default)]
    pub winner: Option<Player>,
    #[serde(default)]
    pub message: String,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            board: Board::empty(),
            current_player: Some(Player::White),
            phase: GamePhase::Placing,
            pieces_remaining: PieceCounts::new(PIECES_PER_PLAYER, PIECES_PER_PLAYER),
            pieces_on_board: PieceCounts::default(),
            selected_position: None,
            mill_formed: false,
            winner: None,
            message: "White's turn - Place a piece".into(),
        }
    }

    /// 从任意棋盘构造局面，棋盘上的子数自动计入 `pieces_on_board`。
    pub fn from_board(
        board: Board,
        current_player: Player,
        phase: GamePhase,
        pieces_remaining: PieceCounts,
    ) -> Self {
        Self {
            board,
            current_player: Some(current_player),
            phase,
            pieces_remaining,
            pieces_on_board: PieceCounts::new(board.count(Player::White), board.count(Player::Black)),
            selected_position: None,
            mill_formed: phase == GamePhase::Removing,
            winner: None,
            message: String::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    pub fn is_flying(&self, player: Player) -> bool {
        self.pieces_on_board.get(player) == 3
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        for player in [Player::White, Player::Black] {
            let recorded = self.pieces_on_board.get(player);
            let actual = self.board.count(player);
            if recorded != actual {
                return Err(IntegrityError::PieceCountMismatch {
                    player,
                    recorded,
                    actual,
                });
            }
            if recorded as u16 + self.pieces_remaining.get(player) as u16
                > PIECES_PER_PLAYER as u16
            {
                return Err(IntegrityError::PieceCountOverflow { player });
            }
        }

        if !self.is_finished() {
            let Some(current) = self.current_player else {
                return Err(IntegrityError::MissingCurrentPlayer);
            };
            if self.phase == GamePhase::Flying && !self.is_flying(current) {
                return Err(IntegrityError::FlyingWithoutThreePieces { player: current });
            }
            if let Some(position) = self.selected_position {
                if self.board.get(position) != Some(current) {
                    return Err(IntegrityError::InvalidSelection { position });
                }
            }
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_matches_lifecycle() {
        let state = GameState::new();
        assert_eq!(state.current_player, Some(Player::White));
        assert_eq!(state.phase, GamePhase::Placing);
        assert_eq!(state.pieces_remaining, PieceCounts::new(9, 9));
        assert_eq!(state.pieces_on_board, PieceCounts::new(0, 0));
        assert_eq!(state.board.occupied(), 0);
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn integrity_detects_count_mismatch() {
        let mut state = GameState::new();
        state.board.set(3, Some(Player::Black));
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::PieceCountMismatch {
                player: Player::Black,
                recorded: 0,
                actual: 1
            })
        );
    }

    #[test]
    fn integrity_rejects_flying_with_four_pieces() {
        let board = Board::from_pieces(&[
            (0, Player::White),
            (4, Player::White),
            (8, Player::White),
            (12, Player::White),
            (20, Player::Black),
            (21, Player::Black),
            (22, Player::Black),
        ]);
        let state = GameState::from_board(board, Player::White, GamePhase::Flying, PieceCounts::default());
        assert!(matches!(
            state.integrity_check(),
            Err(IntegrityError::FlyingWithoutThreePieces { .. })
        ));
    }

    #[test]
    fn fsm_table_allows_reset_only_from_game_over() {
        assert!(GamePhase::GameOver.can_transition_to(GamePhase::Placing));
        assert!(!GamePhase::GameOver.can_transition_to(GamePhase::Moving));
        assert!(!GamePhase::Moving.can_transition_to(GamePhase::Placing));
        assert!(GamePhase::Removing.can_transition_to(GamePhase::Flying));
        assert!(GamePhase::Placing.can_transition_to(GamePhase::Placing));
        assert_eq!(GamePhase::Removing.allowed_actions(), &[ActionKind::Remove]);
    }

    #[test]
    fn state_json_round_trip() {
        let mut state = GameState::new();
        state.board.set(4, Some(Player::White));
        state.pieces_on_board.white = 1;
        state.pieces_remaining.white = 8;
        state.current_player = Some(Player::Black);
        state.message = "Black's turn - Place a piece".into();

        let json = serde_json::to_string(&state).expect("serialize");
        let restored: GameState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, state);
        assert!(json.contains("\"phase\":\"placing\""));
        assert!(json.contains("\"currentPlayer\":\"black\""));
    }

    #[test]
    fn player_parsing() {
        assert_eq!("WHITE".parse::<Player>(), Ok(Player::White));
        assert_eq!("b".parse::<Player>(), Ok(Player::Black));
        assert!("red".parse::<Player>().is_err());
        assert_eq!(Player::White.opponent(), Player::Black);
    }
}
