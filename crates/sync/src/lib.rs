//! 同步原语
//!
//! 向存储栈的其它模块提供基本的互斥锁。
//!
//! 存储层只需要一种锁：块设备 I/O 互斥锁，由前台文件操作和后台写入任务共享，
//! 在每次原生文件系统调用期间持有（粗粒度，而非按扇区加锁）。
//!
//! # 组成
//!
//! - [`RawSpinLock`] - 基于原子操作的原始锁，实现 [`lock_api::RawMutex`]
//! - [`SpinLock`] - 带数据的 RAII 互斥锁（`lock_api::Mutex` 的别名）

#![no_std]

mod raw_spin_lock;
mod spin_lock;

pub use raw_spin_lock::RawSpinLock;
pub use spin_lock::{SpinLock, SpinLockGuard};
