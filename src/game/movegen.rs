//! 走法生成：给定局面与玩家，按当前阶段列出全部合法行动。
//!
//! 输出顺序固定（点位升序），搜索的平局取舍依赖于此。

use serde::{Deserialize, Serialize};

use super::board::{adjacency, Position};
use super::rules::is_removable;
use super::state::{Board, GamePhase, GameState, Player};

/// 引擎可执行的三类行动。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AiMove {
    Place { to: Position },
    Move { from: Position, to: Position },
    Remove { position: Position },
}

/// `pos` 上棋子可以到达的空位。`pos` 为空时返回空集。
pub fn legal_destinations(board: &Board, pos: Position, is_flying: bool) -> Vec<Position> {
    if board.get(pos).is_none() {
        return Vec::new();
    }
    if is_flying {
        board.empty_positions().collect()
    } else {
        adjacency(pos)
            .iter()
            .copied()
            .filter(|&to| board.is_empty_at(to))
            .collect()
    }
}

fn destination_count(board: &Board, pos: Position, is_flying: bool) -> usize {
    if is_flying {
        board.empty_positions().count()
    } else {
        adjacency(pos)
            .iter()
            .filter(|&&to| board.is_empty_at(to))
            .count()
    }
}

pub fn has_any_legal_move(board: &Board, player: Player, is_flying: bool) -> bool {
    board
        .owned_by(player)
        .any(|pos| destination_count(board, pos, is_flying) > 0)
}

/// 所有己方棋子的合法目的地总数。
pub fn mobility(board: &Board, player: Player, is_flying: bool) -> usize {
    board
        .owned_by(player)
        .map(|pos| destination_count(board, pos, is_flying))
        .sum()
}

/// 没有相邻空位的棋子数（不考虑飞子）。
pub fn blocked_pieces(board: &Board, player: Player) -> usize {
    board
        .owned_by(player)
        .filter(|&pos| destination_count(board, pos, false) == 0)
        .count()
}

pub fn generate_moves(state: &GameState, player: Player) -> Vec<AiMove> {
    let board = &state.board;
    match state.phase {
        GamePhase::Placing => board
            .empty_positions()
            .map(|to| AiMove::Place { to })
            .collect(),
        GamePhase::Moving | GamePhase::Flying => {
            let flying = state.is_flying(player);
            board
                .owned_by(player)
                .flat_map(|from| {
                    legal_destinations(board, from, flying)
                        .into_iter()
                        .map(move |to| AiMove::Move { from, to })
                })
                .collect()
        }
        GamePhase::Removing => {
            let opponent = player.opponent();
            board
                .owned_by(opponent)
                .filter(|&pos| is_removable(board, pos, opponent))
                .map(|position| AiMove::Remove { position })
                .collect()
        }
        GamePhase::GameOver => Vec::new(),
    }
}
