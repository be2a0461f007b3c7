//! 提示：借用搜索引擎给出当前行动方的推荐走法，并附上说明文字。

use serde::{Deserialize, Serialize};

use super::minimax::{AiAgent, AiConfig, AiDifficulty};
use crate::game::{AiMove, GameState, RuleEngine};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub action: AiMove,
    pub reason: String,
    /// 搜索给出的评估值，越大越推荐。
    pub priority: i32,
    pub forms_mill: bool,
}

fn describe(action: AiMove, forms_mill: bool) -> String {
    match (action, forms_mill) {
        (AiMove::Place { .. }, true) => {
            "Place here to form a mill! You'll get to remove an opponent piece.".to_string()
        }
        (AiMove::Place { .. }, false) => {
            "Strategic position that controls the center and gives you flexibility.".to_string()
        }
        (AiMove::Move { from, to }, true) => {
            format!("Move from position {from} to {to} to form a mill!")
        }
        (AiMove::Move { from, to }, false) => {
            format!("Move from {from} to {to} for better position control.")
        }
        (AiMove::Remove { position }, _) => format!(
            "Remove the piece at position {position} to weaken your opponent's position."
        ),
    }
}

/// 为当前行动方生成一条提示。对局结束或无子可动时返回 `None`。
pub fn generate_hint(state: &GameState, difficulty: AiDifficulty) -> Option<Hint> {
    generate_hint_with(state, AiConfig::from_difficulty(difficulty))
}

/// 按完整配置（例如带时间上限）生成提示；随机走子概率总是置零。
pub fn generate_hint_with(state: &GameState, config: AiConfig) -> Option<Hint> {
    let player = state.current_player?;
    let config = config.with_random_move_chance(0.0);
    let decision = AiAgent::new(config).decide_action(state, player);
    let action = decision.action?;

    // 试走只用于分类，不提交。
    let forms_mill = RuleEngine::simulate(state, &action)
        .map(|resolution| resolution.mill_formed())
        .unwrap_or(false);

    Some(Hint {
        action,
        reason: describe(action, forms_mill),
        priority: decision.evaluation,
        forms_mill,
    })
}

/// 在给定的难度序列上各取一条提示，去重后按优先级降序排列。
pub fn hint_options_with(state: &GameState, difficulties: &[AiDifficulty]) -> Vec<Hint> {
    let mut hints: Vec<Hint> = Vec::new();
    for &difficulty in difficulties {
        if let Some(hint) = generate_hint(state, difficulty) {
            if !hints.iter().any(|existing| existing.action == hint.action) {
                hints.push(hint);
            }
        }
    }
    hints.sort_by(|a, b| b.priority.cmp(&a.priority));
    hints
}

/// 最多 `count` 条提示，依次取自困难、中等、简单三档。
pub fn hint_options(state: &GameState, count: usize) -> Vec<Hint> {
    const LEVELS: [AiDifficulty; 3] = [AiDifficulty::Hard, AiDifficulty::Medium, AiDifficulty::Easy];
    hint_options_with(state, &LEVELS[..count.min(LEVELS.len())])
}
