//! 静态局面评估。
//!
//! 每项特征按玩家分别计算后相减，因此 `evaluate(s, p) == -evaluate(s, p.opponent())`。

use crate::game::{
    has_any_legal_move, mills, movegen, GamePhase, GameState, Player, CROSS_POSITIONS,
};

pub const WEIGHT_PIECE: i32 = 100;
pub const WEIGHT_REMAINING: i32 = WEIGHT_PIECE / 2;
pub const WEIGHT_MILL: i32 = 50;
pub const WEIGHT_POTENTIAL_MILL: i32 = 20;
pub const WEIGHT_MOBILITY: i32 = 10;
pub const WEIGHT_BLOCKED: i32 = -15;
pub const WEIGHT_CROSS: i32 = 5;
pub const WIN_BONUS: i32 = 10_000;

/// 单个玩家的特征向量。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub pieces: i32,
    pub remaining: i32,
    pub mills: i32,
    pub potential_mills: i32,
    pub mobility: i32,
    pub blocked: i32,
    pub cross: i32,
    pub losses: i32,
}

pub fn features(state: &GameState, player: Player) -> Features {
    let board = &state.board;
    let flying = state.is_flying(player);

    let mut formed = 0;
    let mut potential = 0;
    for mill in mills() {
        let owned = mill.iter().filter(|&&p| board.get(p) == Some(player)).count();
        let empty = mill.iter().filter(|&&p| board.is_empty_at(p)).count();
        if owned == 3 {
            formed += 1;
        } else if owned == 2 && empty == 1 {
            potential += 1;
        }
    }

    let mobility = if state.phase == GamePhase::Placing {
        0
    } else {
        movegen::mobility(board, player, flying) as i32
    };

    let too_few =
        state.pieces_on_board.get(player) <= 2 && state.pieces_remaining.get(player) == 0;
    let no_moves =
        state.phase != GamePhase::Placing && !has_any_legal_move(board, player, flying);

    Features {
        pieces: state.pieces_on_board.get(player) as i32,
        remaining: state.pieces_remaining.get(player) as i32,
        mills: formed,
        potential_mills: potential,
        mobility,
        blocked: movegen::blocked_pieces(board, player) as i32,
        cross: CROSS_POSITIONS
            .iter()
            .filter(|&&p| board.get(p) == Some(player))
            .count() as i32,
        losses: too_few as i32 + no_moves as i32,
    }
}

/// 从 `perspective` 一方看的局面分。
pub fn evaluate(state: &GameState, perspective: Player) -> i32 {
    let own = features(state, perspective);
    let opp = features(state, perspective.opponent());

    // 对手剩余待放的子越多，我方落子节奏越领先。
    (own.pieces - opp.pieces) * WEIGHT_PIECE
        + (opp.remaining - own.remaining) * WEIGHT_REMAINING
        + (own.mills - opp.mills) * WEIGHT_MILL
        + (own.potential_mills - opp.potential_mills) * WEIGHT_POTENTIAL_MILL
        + (own.mobility - opp.mobility) * WEIGHT_MOBILITY
        + (opp.blocked - own.blocked) * WEIGHT_BLOCKED
        + (own.cross - opp.cross) * WEIGHT_CROSS
        + (opp.losses - own.losses) * WIN_BONUS
}
