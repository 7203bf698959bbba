//! FTL 错误类型

use core::fmt;

use device::{BlockError, FlashError};

/// FTL 错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtlError {
    /// 尚未挂载
    NotMounted,
    /// 映射表不一致或数据校验失败
    Corrupt,
    /// 逻辑扇区号越界
    OutOfRange,
    /// 没有可回收的空间
    NoSpace,
    /// 底层 Flash 错误
    Flash(FlashError),
    /// Flash 几何参数不满足 FTL 要求
    InvalidGeometry,
}

impl fmt::Display for FtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtlError::NotMounted => f.write_str("ftl not mounted"),
            FtlError::Corrupt => f.write_str("ftl map corrupt"),
            FtlError::OutOfRange => f.write_str("logical sector out of range"),
            FtlError::NoSpace => f.write_str("ftl has no reclaimable space"),
            FtlError::Flash(e) => write!(f, "flash: {}", e),
            FtlError::InvalidGeometry => f.write_str("invalid flash geometry"),
        }
    }
}

impl core::error::Error for FtlError {}

impl From<FlashError> for FtlError {
    fn from(e: FlashError) -> Self {
        FtlError::Flash(e)
    }
}

impl From<FtlError> for BlockError {
    fn from(e: FtlError) -> Self {
        match e {
            FtlError::NotMounted => BlockError::NotReady,
            FtlError::OutOfRange => BlockError::OutOfRange,
            _ => BlockError::Io,
        }
    }
}
