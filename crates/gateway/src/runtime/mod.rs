//! Turn runtime: the orchestrator, its cancellation map, the anonymous
//! quota gate and the background title job.

pub mod cancel;
pub mod quota;
pub mod title;
pub mod turn;

pub use turn::{
    prepare_turn, run_turn, PreparedTurn, TurnError, TurnEvent, TurnHandle, TurnInput, TurnStatus,
};
