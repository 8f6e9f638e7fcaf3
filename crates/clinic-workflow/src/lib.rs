//! # 门诊工作流模块
//!
//! 提供医生当天就诊队列的完整管理功能，包括：
//! - 就诊状态机：只允许逐级前进的状态转换
//! - 队列视图：急诊优先、按临床阶段排序的过滤与检索
//! - 队列引擎：拉取队列、推进状态并给出提示
//! - 通知计数：未读数的周期同步与乐观更新

pub mod engine;
pub mod notification;
pub mod queue;
pub mod refresh;
pub mod state_machine;
pub mod store;

// 重新导出主要类型
pub use engine::{AdvancePolicy, QueueEngine};
pub use notification::{NotificationCounter, NotificationFilter, OptimisticUpdate};
pub use queue::{order_queue, sort_key, state_priority, QueueCounts, QueueFilter, EMERGENCY_OFFSET};
pub use refresh::PeriodicTask;
pub use state_machine::{EncounterEvent, EncounterStateMachine};
pub use store::EncounterStore;
