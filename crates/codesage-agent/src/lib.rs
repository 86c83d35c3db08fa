//! CodeSage Agent - 自我纠错的检索-生成-评估循环
//!
//! 一次查询按固定状态机执行：
//! `retrieve → generate → evaluate → {retrieve | end}`，
//! 评估不通过时重新检索，检索次数上限为 [`MAX_ITERATIONS`]。

pub mod assistant;
pub mod evaluator;
pub mod events;
pub mod generator;
pub mod graph;
pub mod retriever;
pub mod state;

pub use assistant::*;
pub use evaluator::*;
pub use events::*;
pub use generator::*;
pub use graph::*;
pub use retriever::*;
pub use state::*;
