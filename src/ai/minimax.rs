use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use super::eval::evaluate;
use crate::console_log;
use crate::game::{generate_moves, AiMove, GameState, Player, RuleEngine};
use crate::utils::Stopwatch;

/// 终局分，高于任何静态评估值。
pub const MATE_SCORE: i32 = 100_000;

const CLOCK_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    Medium,
    Hard,
}

impl AiDifficulty {
    pub fn depth(self) -> u8 {
        match self {
            AiDifficulty::Easy => 2,
            AiDifficulty::Medium => 4,
            AiDifficulty::Hard => 6,
        }
    }
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "medium" | "normal" => Ok(AiDifficulty::Medium),
            "hard" => Ok(AiDifficulty::Hard),
            _ => Err(()),
        }
    }
}

/// `time_limit` 在 JSON 中以毫秒整数表示（`timeLimitMs`）。
mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(|limit| limit.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// 搜索配置。JSON 中缺省的字段取中等难度预设的值。
///
/// `prefer_fast_wins` 默认开启：终局节点记为 `±(MATE_SCORE + 剩余深度)`，
/// 因此 `AiDecision::evaluation` 在必胜/必败时的量级是 ±100_000 以上，
/// 而不是静态评估的 ±10_000。关闭后终局节点直接使用 `evaluate`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    pub depth: u8,
    pub use_alpha_beta: bool,
    /// 每次决策直接随机走子的概率。
    pub random_move_chance: f64,
    #[serde(rename = "timeLimitMs", with = "millis")]
    pub time_limit: Option<Duration>,
    pub iterative_deepening: bool,
    pub prefer_fast_wins: bool,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        let random_move_chance = match difficulty {
            AiDifficulty::Easy => 0.3,
            AiDifficulty::Medium | AiDifficulty::Hard => 0.0,
        };
        Self {
            difficulty,
            depth: difficulty.depth(),
            use_alpha_beta: true,
            random_move_chance,
            time_limit: None,
            iterative_deepening: false,
            prefer_fast_wins: true,
        }
    }

    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth.max(1);
        self
    }

    pub fn with_alpha_beta(mut self, enabled: bool) -> Self {
        self.use_alpha_beta = enabled;
        self
    }

    pub fn with_random_move_chance(mut self, chance: f64) -> Self {
        self.random_move_chance = chance.clamp(0.0, 1.0);
        self
    }

    pub fn with_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_iterative_deepening(mut self, enabled: bool) -> Self {
        self.iterative_deepening = enabled;
        self
    }

    pub fn with_fast_wins(mut self, enabled: bool) -> Self {
        self.prefer_fast_wins = enabled;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Medium)
    }
}

/// 外部取消信号；可在线程或回调之间共享。
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<AiMove>,
    pub evaluation: i32,
    pub depth_reached: u8,
    pub nodes: u64,
    pub timed_out: bool,
    pub duration_ms: u64,
    pub randomized: bool,
}

struct SearchStats {
    nodes: u64,
    depth_reached: u8,
    timed_out: bool,
}

impl SearchStats {
    fn new() -> Self {
        Self {
            nodes: 0,
            depth_reached: 0,
            timed_out: false,
        }
    }
}

/// 一轮根节点搜索的结果；`complete == false` 表示中途被打断。
struct RootOutcome {
    best: Option<(AiMove, i32)>,
    complete: bool,
}

/// 终局节点的分值。`prefer_fast_wins` 时剩余深度越大（赢得越快）分越高。
pub(crate) fn terminal_score(
    state: &GameState,
    root_player: Player,
    depth_remaining: u8,
    prefer_fast_wins: bool,
) -> i32 {
    if !prefer_fast_wins {
        return evaluate(state, root_player);
    }
    match state.winner {
        Some(winner) if winner == root_player => MATE_SCORE + depth_remaining as i32,
        Some(_) => -(MATE_SCORE + depth_remaining as i32),
        None => evaluate(state, root_player),
    }
}

pub struct AiAgent<R = SmallRng> {
    config: AiConfig,
    rng: R,
    cancel: Option<CancelToken>,
}

impl AiAgent<SmallRng> {
    pub fn new(config: AiConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> AiAgent<R> {
    pub fn with_rng(config: AiConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn empty_decision(&self, state: &GameState, player: Player, clock: &Stopwatch) -> AiDecision {
        AiDecision {
            action: None,
            evaluation: evaluate(state, player),
            depth_reached: 0,
            nodes: 0,
            timed_out: false,
            duration_ms: clock.elapsed().as_millis() as u64,
            randomized: false,
        }
    }

    fn random_decision(
        &mut self,
        state: &GameState,
        player: Player,
        moves: &[AiMove],
        clock: &Stopwatch,
    ) -> Option<AiDecision> {
        let action = *moves.choose(&mut self.rng)?;
        let evaluation = RuleEngine::simulate(state, &action)
            .map(|resolution| evaluate(&resolution.state, player))
            .unwrap_or_else(|_| evaluate(state, player));
        Some(AiDecision {
            action: Some(action),
            evaluation,
            depth_reached: 1,
            nodes: 1,
            timed_out: false,
            duration_ms: clock.elapsed().as_millis() as u64,
            randomized: true,
        })
    }

    /// 为 `player` 选出一步。局面已结束、不是其回合或无子可动时 `action` 为 `None`。
    pub fn decide_action(&mut self, state: &GameState, player: Player) -> AiDecision {
        let clock = Stopwatch::start();

        if state.is_finished() || state.current_player != Some(player) {
            return self.empty_decision(state, player, &clock);
        }

        let moves = generate_moves(state, player);
        if moves.is_empty() {
            return self.empty_decision(state, player, &clock);
        }

        let chance = self.config.random_move_chance;
        if chance > 0.0 && self.rng.gen_bool(chance.min(1.0)) {
            if let Some(decision) = self.random_decision(state, player, &moves, &clock) {
                return decision;
            }
        }

        let mut stats = SearchStats::new();
        let depth = self.config.depth.max(1);

        let mut best = None;
        if self.config.iterative_deepening {
            for iteration in 1..=depth {
                let outcome = self.search_root(state, player, &moves, iteration, &clock, &mut stats);
                if outcome.complete || best.is_none() {
                    best = outcome.best.or(best);
                }
                if !outcome.complete {
                    break;
                }
            }
        } else {
            best = self
                .search_root(state, player, &moves, depth, &clock, &mut stats)
                .best;
        }

        // 连一个根走法都没算完时，退回生成器给出的第一步。
        let (action, evaluation) = best.unwrap_or((moves[0], evaluate(state, player)));

        let decision = AiDecision {
            action: Some(action),
            evaluation,
            depth_reached: stats.depth_reached,
            nodes: stats.nodes,
            timed_out: stats.timed_out,
            duration_ms: clock.elapsed().as_millis() as u64,
            randomized: false,
        };
        console_log!(
            "[ai] {player} {:?} -> {:?} score={} nodes={} depth={} {}ms{}",
            self.config.difficulty,
            action,
            decision.evaluation,
            decision.nodes,
            decision.depth_reached,
            decision.duration_ms,
            if decision.timed_out { " (timed out)" } else { "" }
        );
        decision
    }

    fn search_root(
        &mut self,
        state: &GameState,
        root_player: Player,
        moves: &[AiMove],
        depth: u8,
        clock: &Stopwatch,
        stats: &mut SearchStats,
    ) -> RootOutcome {
        let mut best: Option<(AiMove, i32)> = None;
        let mut alpha = i32::MIN;
        let beta = i32::MAX;

        for mv in moves {
            let Ok(resolution) = RuleEngine::simulate(state, mv) else {
                continue;
            };
            let child = resolution.state;
            let maximizing = child.current_player == Some(root_player);
            let score = self.minimax(
                &child,
                depth - 1,
                1,
                alpha,
                beta,
                maximizing,
                root_player,
                clock,
                stats,
            );

            if stats.timed_out {
                return RootOutcome {
                    best,
                    complete: false,
                };
            }

            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((*mv, score));
            }
            if self.config.use_alpha_beta {
                alpha = alpha.max(score);
            }
        }

        RootOutcome {
            best,
            complete: true,
        }
    }

    fn should_stop(&self, clock: &Stopwatch, stats: &SearchStats) -> bool {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return true;
        }
        stats.nodes % CLOCK_CHECK_INTERVAL == 0 && clock.exceeded(self.config.time_limit)
    }

    #[allow(clippy::too_many_arguments)]
    fn minimax(
        &mut self,
        state: &GameState,
        depth_remaining: u8,
        ply: u8,
        mut alpha: i32,
        mut beta: i32,
        maximizing: bool,
        root_player: Player,
        clock: &Stopwatch,
        stats: &mut SearchStats,
    ) -> i32 {
        stats.nodes += 1;
        stats.depth_reached = stats.depth_reached.max(ply);

        if stats.timed_out || self.should_stop(clock, stats) {
            stats.timed_out = true;
            return evaluate(state, root_player);
        }

        if state.is_finished() {
            return terminal_score(
                state,
                root_player,
                depth_remaining,
                self.config.prefer_fast_wins,
            );
        }
        if depth_remaining == 0 {
            return evaluate(state, root_player);
        }

        let Some(mover) = state.current_player else {
            return evaluate(state, root_player);
        };
        let moves = generate_moves(state, mover);
        if moves.is_empty() {
            return evaluate(state, root_player);
        }

        let mut value = if maximizing { i32::MIN } else { i32::MAX };
        for mv in &moves {
            let Ok(resolution) = RuleEngine::simulate(state, mv) else {
                continue;
            };
            let child = resolution.state;
            let child_maximizing = child.current_player == Some(root_player);
            let score = self.minimax(
                &child,
                depth_remaining - 1,
                ply.saturating_add(1),
                alpha,
                beta,
                child_maximizing,
                root_player,
                clock,
                stats,
            );
            if stats.timed_out {
                return value;
            }

            if maximizing {
                value = value.max(score);
                if self.config.use_alpha_beta {
                    alpha = alpha.max(value);
                }
            } else {
                value = value.min(score);
                if self.config.use_alpha_beta {
                    beta = beta.min(value);
                }
            }
            if self.config.use_alpha_beta && beta <= alpha {
                break;
            }
        }
        value
    }
}

/// 按难度为 `ai_player` 求一步；`None` 表示 AI 已被困死。
pub fn get_ai_move(state: &GameState, ai_player: Player, difficulty: AiDifficulty) -> Option<AiMove> {
    AiAgent::new(AiConfig::from_difficulty(difficulty))
        .decide_action(state, ai_player)
        .action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Board, GamePhase, PieceCounts};

    fn deterministic(depth: u8) -> AiConfig {
        AiConfig::from_difficulty(AiDifficulty::Medium)
            .with_depth(depth)
            .with_random_move_chance(0.0)
    }

    /// White can close the top row by moving 14 -> 2; Black is down to three pieces.
    fn winning_position() -> GameState {
        let board = Board::from_pieces(&[
            (0, Player::White),
            (1, Player::White),
            (14, Player::White),
            (19, Player::White),
            (6, Player::Black),
            (16, Player::Black),
            (22, Player::Black),
        ]);
        GameState::from_board(board, Player::White, GamePhase::Moving, PieceCounts::default())
    }

    fn midgame_position() -> GameState {
        let board = Board::from_pieces(&[
            (0, Player::White),
            (4, Player::White),
            (13, Player::White),
            (18, Player::White),
            (2, Player::Black),
            (10, Player::Black),
            (16, Player::Black),
            (21, Player::Black),
        ]);
        GameState::from_board(board, Player::White, GamePhase::Moving, PieceCounts::default())
    }

    fn exhaustive(state: &GameState, depth: u8, root: Player, fast_wins: bool) -> i32 {
        if state.is_finished() {
            return terminal_score(state, root, depth, fast_wins);
        }
        if depth == 0 {
            return evaluate(state, root);
        }
        let Some(mover) = state.current_player else {
            return evaluate(state, root);
        };
        let moves = generate_moves(state, mover);
        if moves.is_empty() {
            return evaluate(state, root);
        }
        let scores = moves.iter().map(|mv| {
            let child = RuleEngine::simulate(state, mv).expect("legal").state;
            exhaustive(&child, depth - 1, root, fast_wins)
        });
        if mover == root {
            scores.max().unwrap_or(i32::MIN)
        } else {
            scores.min().unwrap_or(i32::MAX)
        }
    }

    #[test]
    fn ai_handles_finished_game() {
        let state = RuleEngine::declare_blocked(&midgame_position(), Player::Black)
            .expect("active game")
            .state;
        let mut agent = AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Easy), 1);
        let decision = agent.decide_action(&state, Player::White);
        assert!(decision.action.is_none());
        assert_eq!(decision.evaluation, evaluate(&state, Player::White));
        assert_eq!(decision.nodes, 0);
    }

    #[test]
    fn no_move_when_it_is_not_the_ai_turn() {
        let mut agent = AiAgent::with_seed(deterministic(2), 1);
        assert!(agent
            .decide_action(&midgame_position(), Player::Black)
            .action
            .is_none());
    }

    #[test]
    fn takes_the_mill_that_wins_the_game() {
        let mut agent = AiAgent::with_seed(deterministic(2), 3);
        let decision = agent.decide_action(&winning_position(), Player::White);
        assert_eq!(decision.action, Some(AiMove::Move { from: 14, to: 2 }));
        assert!(decision.evaluation >= MATE_SCORE);
    }

    #[test]
    fn prefers_the_quickest_win_at_greater_depth() {
        let mut agent = AiAgent::with_seed(deterministic(4), 3);
        let decision = agent.decide_action(&winning_position(), Player::White);
        assert_eq!(decision.action, Some(AiMove::Move { from: 14, to: 2 }));
        assert_eq!(decision.evaluation, MATE_SCORE + 2);
    }

    #[test]
    fn removal_after_mill_finishes_the_game() {
        let after_mill = RuleEngine::move_piece(&winning_position(), 14, 2)
            .expect("legal")
            .state;
        assert_eq!(after_mill.phase, GamePhase::Removing);
        let mut agent = AiAgent::with_seed(deterministic(2), 3);
        let action = agent
            .decide_action(&after_mill, Player::White)
            .action
            .expect("removal available");
        assert!(matches!(action, AiMove::Remove { .. }));
    }

    #[test]
    fn repeated_searches_are_deterministic() {
        let state = midgame_position();
        let first = AiAgent::with_seed(deterministic(3), 9).decide_action(&state, Player::White);
        let second = AiAgent::with_seed(deterministic(3), 9).decide_action(&state, Player::White);
        assert_eq!(first.action, second.action);
        assert_eq!(first.evaluation, second.evaluation);
        assert!(!first.randomized);
    }

    #[test]
    fn full_width_score_matches_exhaustive_search() {
        let state = midgame_position();
        let depth = 3;
        let full = AiAgent::with_seed(deterministic(depth).with_alpha_beta(false), 0)
            .decide_action(&state, Player::White);

        let expected = generate_moves(&state, Player::White)
            .iter()
            .map(|mv| {
                let child = RuleEngine::simulate(&state, mv).expect("legal").state;
                exhaustive(&child, depth - 1, Player::White, true)
            })
            .max()
            .expect("white has moves");
        assert_eq!(full.evaluation, expected);

        let pruned = AiAgent::with_seed(deterministic(depth), 0).decide_action(&state, Player::White);
        assert_eq!(pruned.action, full.action);
        assert_eq!(pruned.evaluation, full.evaluation);
        assert!(pruned.nodes <= full.nodes);
    }

    #[test]
    fn iterative_deepening_agrees_with_fixed_depth() {
        let state = midgame_position();
        let fixed = AiAgent::with_seed(deterministic(3), 0).decide_action(&state, Player::White);
        let deepened = AiAgent::with_seed(deterministic(3).with_iterative_deepening(true), 0)
            .decide_action(&state, Player::White);
        assert_eq!(fixed.action, deepened.action);
        assert_eq!(fixed.evaluation, deepened.evaluation);
    }

    #[test]
    fn cancelled_search_still_returns_a_legal_move() {
        let state = midgame_position();
        let token = CancelToken::new();
        token.cancel();
        let decision = AiAgent::with_seed(deterministic(4), 0)
            .with_cancel_token(token)
            .decide_action(&state, Player::White);
        assert!(decision.timed_out);
        let action = decision.action.expect("fallback move");
        assert!(generate_moves(&state, Player::White).contains(&action));
    }

    #[test]
    fn random_move_chance_is_driven_by_the_injected_rng() {
        let state = midgame_position();
        let legal = generate_moves(&state, Player::White);

        let always = AiConfig::from_difficulty(AiDifficulty::Easy).with_random_move_chance(1.0);
        let decision = AiAgent::with_seed(always, 5).decide_action(&state, Player::White);
        assert!(decision.randomized);
        assert!(legal.contains(&decision.action.expect("move")));

        let again = AiAgent::with_seed(
            AiConfig::from_difficulty(AiDifficulty::Easy).with_random_move_chance(1.0),
            5,
        )
        .decide_action(&state, Player::White);
        assert_eq!(decision.action, again.action);

        let never = AiConfig::from_difficulty(AiDifficulty::Easy).with_random_move_chance(0.0);
        for seed in 0..8 {
            assert!(!AiAgent::with_seed(never.clone(), seed)
                .decide_action(&state, Player::White)
                .randomized);
        }
    }

    #[test]
    fn difficulty_presets() {
        assert_eq!("Normal".parse::<AiDifficulty>(), Ok(AiDifficulty::Medium));
        assert!("extreme".parse::<AiDifficulty>().is_err());

        let easy = AiConfig::from_difficulty(AiDifficulty::Easy);
        assert_eq!((easy.depth, easy.random_move_chance), (2, 0.3));
        let hard = AiConfig::from_difficulty(AiDifficulty::Hard);
        assert_eq!((hard.depth, hard.random_move_chance), (6, 0.0));
        assert!(easy.use_alpha_beta && hard.use_alpha_beta);
    }

    #[test]
    fn clock_cutoff_keeps_the_last_completed_iteration() {
        let state = midgame_position();
        let config = AiConfig::from_difficulty(AiDifficulty::Hard)
            .with_iterative_deepening(true)
            .with_time_limit(Some(Duration::ZERO));
        let decision = AiAgent::with_seed(config, 0).decide_action(&state, Player::White);

        assert!(decision.timed_out);
        // 时钟每隔 CLOCK_CHECK_INTERVAL 个节点检查一次。
        assert_eq!(decision.nodes, CLOCK_CHECK_INTERVAL);
        assert!(decision.depth_reached < 6);

        let action = decision.action.expect("move from a completed iteration");
        let shallower: Vec<_> = (1..6)
            .map(|depth| {
                AiAgent::with_seed(deterministic(depth), 0)
                    .decide_action(&state, Player::White)
                    .action
            })
            .collect();
        assert!(shallower.contains(&Some(action)), "{action:?} not in {shallower:?}");
    }

    #[test]
    fn raw_terminal_scores_still_match_exhaustive_search() {
        let mut rng = SmallRng::seed_from_u64(21);
        let depth = 3;
        let mut checked = 0;
        for _ in 0..12 {
            let mut state = GameState::new();
            let plies = rng.gen_range(0..40);
            for _ in 0..plies {
                let Some(player) = state.current_player else {
                    break;
                };
                let moves = generate_moves(&state, player);
                let Some(mv) = moves.choose(&mut rng) else {
                    break;
                };
                state = RuleEngine::simulate(&state, mv).expect("legal").state;
            }
            let Some(player) = state.current_player else {
                continue;
            };
            let moves = generate_moves(&state, player);
            if moves.is_empty() {
                continue;
            }

            let expected = moves
                .iter()
                .map(|mv| {
                    let child = RuleEngine::simulate(&state, mv).expect("legal").state;
                    exhaustive(&child, depth - 1, player, false)
                })
                .max()
                .expect("moves");
            let raw = deterministic(depth).with_fast_wins(false);
            let full = AiAgent::with_seed(raw.clone().with_alpha_beta(false), 0)
                .decide_action(&state, player);
            let pruned = AiAgent::with_seed(raw, 0).decide_action(&state, player);

            assert_eq!(full.evaluation, expected, "{state:?}");
            assert_eq!(pruned.evaluation, expected, "{state:?}");
            assert_eq!(pruned.action, full.action);
            checked += 1;
        }
        assert!(checked > 0);
    }

    #[test]
    fn partial_config_json_fills_in_medium_defaults() {
        let config: AiConfig =
            serde_json::from_str(r#"{"difficulty":"hard","depth":6,"timeLimitMs":40}"#)
                .expect("deserialize");
        assert_eq!(config.time_limit, Some(Duration::from_millis(40)));
        assert_eq!(config.depth, 6);
        assert!(config.use_alpha_beta);
        assert!(config.prefer_fast_wins);
        assert!(!config.iterative_deepening);
    }

    #[test]
    fn config_json_round_trip() {
        let config = AiConfig::from_difficulty(AiDifficulty::Hard)
            .with_time_limit(Some(Duration::from_millis(250)));
        let json = serde_json::to_string(&config).expect("serialize");
        let restored: AiConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, config);
    }
}
