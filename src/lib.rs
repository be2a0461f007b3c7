pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{
    evaluate, generate_hint, generate_hint_with, get_ai_move, hint_options, AiAgent, AiConfig,
    AiDecision, AiDifficulty, CancelToken, Hint,
};
pub use game::{
    generate_moves, AiMove, Board, GameAction, GameEvent, GamePhase, GameState, IntegrityError,
    PieceCounts, Player, Position, RuleEngine, RuleError, RuleResolution, VictoryReason,
    VictoryState,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

fn parse_state(json: &str) -> Result<GameState, JsValue> {
    serde_json::from_str(json).map_err(|err| {
        utils::warn(&format!("[morris] rejected game state: {err}"));
        serde_to_js_error(err)
    })
}

fn parse_player(value: &str) -> Result<Player, JsValue> {
    Player::from_str(value).map_err(|_| JsValue::from_str(&format!("unknown player: {value}")))
}

/// 未知或缺省的难度按中等处理。
fn parse_difficulty(value: Option<&str>) -> AiDifficulty {
    value
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or(AiDifficulty::Medium)
}

/// 给定时间上限（毫秒）时打开迭代加深，超时后返回最深一轮完整搜索的结果。
fn ai_config(difficulty: Option<&str>, time_limit_ms: Option<u32>) -> AiConfig {
    let config = AiConfig::from_difficulty(parse_difficulty(difficulty));
    match time_limit_ms {
        Some(ms) => config
            .with_time_limit(Some(Duration::from_millis(u64::from(ms))))
            .with_iterative_deepening(true),
        None => config,
    }
}

fn log_outcome(resolution: &RuleResolution) {
    if let Some(victory) = resolution.victory {
        console_log!("[morris] {} wins ({:?})", victory.winner, victory.reason);
    }
}

#[derive(Serialize)]
struct AiMoveResponse {
    decision: AiDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<RuleResolution>,
    blocked: bool,
}

/// 持有一局棋的 JS 对象；每个成功的行动返回 `RuleResolution` 的 JSON。
#[wasm_bindgen]
pub struct MorrisEngine {
    state: GameState,
}

#[wasm_bindgen]
impl MorrisEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(initial_state_json: Option<String>) -> Result<MorrisEngine, JsValue> {
        let state = match initial_state_json {
            Some(json) => parse_state(&json)?,
            None => GameState::new(),
        };
        Ok(MorrisEngine { state })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(&self.state)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.state = parse_state(json)?;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<String, JsValue> {
        self.state = RuleEngine::reset();
        to_json(&self.state)
    }

    pub fn place(&mut self, position: Position) -> Result<String, JsValue> {
        self.execute(&GameAction::Place { position })
    }

    pub fn select(&mut self, position: Position) -> Result<String, JsValue> {
        self.execute(&GameAction::Select { position })
    }

    pub fn move_piece(&mut self, from: Position, to: Position) -> Result<String, JsValue> {
        self.execute(&GameAction::Move { from, to })
    }

    pub fn remove(&mut self, position: Position) -> Result<String, JsValue> {
        self.execute(&GameAction::Remove { position })
    }

    pub fn click(&mut self, position: Position) -> Result<String, JsValue> {
        self.execute(&GameAction::Click { position })
    }

    /// 接收 `GameAction` 的 JSON（如 `{"type":"move","from":4,"to":7}`）。
    pub fn apply_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: GameAction = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        self.execute(&action)
    }

    pub fn legal_moves_json(&self) -> Result<String, JsValue> {
        let moves = match self.state.current_player {
            Some(player) => generate_moves(&self.state, player),
            None => Vec::new(),
        };
        to_json(&moves)
    }

    /// AI 为 `player` 走一步并提交。AI 被困死时判对手获胜，返回 `blocked: true`。
    pub fn apply_ai_move(
        &mut self,
        player: &str,
        difficulty: Option<String>,
        time_limit_ms: Option<u32>,
    ) -> Result<String, JsValue> {
        let player = parse_player(player)?;
        if self.state.is_finished() {
            return Err(to_js_error(RuleError::GameFinished));
        }
        if self.state.current_player != Some(player) {
            return Err(to_js_error(RuleError::NotPlayerTurn));
        }

        let config = ai_config(difficulty.as_deref(), time_limit_ms);
        let decision = AiAgent::new(config).decide_action(&self.state, player);

        let (applied, blocked) = match decision.action {
            Some(action) => {
                let resolution =
                    RuleEngine::simulate(&self.state, &action).map_err(to_js_error)?;
                (Some(resolution), false)
            }
            None => {
                let resolution =
                    RuleEngine::declare_blocked(&self.state, player).map_err(to_js_error)?;
                (Some(resolution), true)
            }
        };
        if let Some(resolution) = &applied {
            log_outcome(resolution);
            self.state = resolution.state.clone();
        }

        to_json(&AiMoveResponse {
            decision,
            applied,
            blocked,
        })
    }

    /// 在异步任务里计算 AI 决策（不提交），`delay_ms` 用于模拟思考时间。
    pub fn think_ai(
        &self,
        player: &str,
        difficulty: Option<String>,
        delay_ms: Option<u32>,
        time_limit_ms: Option<u32>,
    ) -> Promise {
        let state = self.state.clone();
        let player = parse_player(player);
        let config = ai_config(difficulty.as_deref(), time_limit_ms);
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            let player = player?;
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let decision = AiAgent::new(config).decide_action(&state, player);
            Ok(JsValue::from_str(&to_json(&decision)?))
        })
    }

    pub fn hint_json(
        &self,
        difficulty: Option<String>,
        time_limit_ms: Option<u32>,
    ) -> Result<String, JsValue> {
        let hint = generate_hint_with(&self.state, ai_config(difficulty.as_deref(), time_limit_ms));
        to_json(&hint)
    }

    pub fn hint_options_json(&self, count: Option<u32>) -> Result<String, JsValue> {
        let count = count.unwrap_or(3) as usize;
        to_json(&hint_options(&self.state, count))
    }

    fn execute(&mut self, action: &GameAction) -> Result<String, JsValue> {
        let resolution = RuleEngine::apply(&self.state, action).map_err(to_js_error)?;
        log_outcome(&resolution);
        self.state = resolution.state.clone();
        to_json(&resolution)
    }
}

/// 返回一局新棋的初始状态。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state() -> Result<JsValue, JsValue> {
    to_value(&GameState::new()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(
    state: JsValue,
    player: &str,
    difficulty: Option<String>,
    time_limit_ms: Option<u32>,
) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let player = parse_player(player)?;
    let config = ai_config(difficulty.as_deref(), time_limit_ms);
    let decision = AiAgent::new(config).decide_action(&state, player);
    to_value(&decision).map_err(JsValue::from)
}

/// 以完整的 `AiConfig` 对象搜索，例如 `{ difficulty: "hard", depth: 6, timeLimitMs: 200,
/// iterativeDeepening: true }`；缺省字段取中等难度的值。
#[wasm_bindgen(js_name = "computeAiMoveWithConfig")]
pub fn compute_ai_move_with_config(
    state: JsValue,
    player: &str,
    config: JsValue,
) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let player = parse_player(player)?;
    let config: AiConfig = from_value(config).map_err(JsValue::from)?;
    let decision = AiAgent::new(config).decide_action(&state, player);
    to_value(&decision).map_err(JsValue::from)
}

/// 试走一个行动并返回结果，不修改传入的状态。
#[wasm_bindgen(js_name = "simulateAction")]
pub fn simulate_action(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: GameAction = from_value(action).map_err(JsValue::from)?;
    match RuleEngine::apply(&state, &action) {
        Ok(resolution) => to_value(&resolution).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

/// 宽松版本：非法行动返回原状态并写入提示信息。
#[wasm_bindgen(js_name = "stepAction")]
pub fn step_action(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: GameAction = from_value(action).map_err(JsValue::from)?;
    to_value(&RuleEngine::step(&state, &action)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "phaseDescription")]
pub fn phase_description(phase: JsValue) -> Result<String, JsValue> {
    let phase: GamePhase = from_value(phase).map_err(JsValue::from)?;
    Ok(phase.description().to_string())
}
