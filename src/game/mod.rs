//! 游戏核心逻辑模块（棋盘拓扑、状态、规则引擎、走法生成）。

pub mod board;
pub mod movegen;
pub mod rules;
pub mod state;

pub use board::{
    adjacency, is_valid_position, mills, mills_containing, Position, CROSS_POSITIONS,
    PIECES_PER_PLAYER, TOTAL_POSITIONS,
};
pub use movegen::{generate_moves, has_any_legal_move, legal_destinations, AiMove};
pub use rules::{
    check_mill, derive_phase, is_removable, loss_reason, positions_in_mills, GameAction,
    RuleEngine, RuleError, RuleResolution,
};
pub use state::{
    ActionKind, Board, GameEvent, GamePhase, GameState, IntegrityError, PieceCounts, Player,
    VictoryReason, VictoryState,
};
