//! 管理端点 API 模块
//!
//! - 虚拟机管理 (VmApi)
//! - 快照管理 (SnapshotApi)
//! - 清单查询 (InventoryApi)

pub mod inventory;
pub mod snapshot;
pub mod vm;

pub use inventory::InventoryApi;
pub use snapshot::SnapshotApi;
pub use vm::VmApi;
