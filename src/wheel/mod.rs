pub mod engine;
pub mod model;
pub mod pending;
pub mod swap;

pub use engine::{SyncState, WheelEngine};
pub use model::{CategoryWheel, DragDenied};
pub use pending::{PendingDisappearance, PendingQueue};
pub use swap::{EquipError, SwapError};

/// Item-bearing slots around the ring.
pub const SLOT_COUNT: usize = 8;
/// Ring slots plus the inert center.
pub const BUFFER_LEN: usize = SLOT_COUNT + 1;
pub const CENTER_SLOT: usize = 8;
/// Ticks a vanished selection is given to reappear before the wheel moves on.
pub const DISAPPEARANCE_WAIT_TICKS: u32 = 5;
