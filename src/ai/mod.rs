//! AI 模块：局面评估、极小化极大搜索与提示。

pub mod eval;
pub mod hint;
pub mod minimax;

pub use eval::{evaluate, features, Features};
pub use hint::{generate_hint, generate_hint_with, hint_options, Hint};
pub use minimax::{get_ai_move, AiAgent, AiConfig, AiDecision, AiDifficulty, CancelToken};
