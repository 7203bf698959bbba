//! 统一错误类型
//!
//! 两种后端（FAT 与日志结构文件系统）的原生错误码在后端边界处被翻译为 [`VfsError`]，
//! 之后的路由层和跨后端操作只透传，不再二次解释。
//! 数值与日志结构文件系统的负数错误码保持一致，可通过 [`VfsError::code()`] 获取。

use core::fmt;

/// 统一错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    /// 设备操作出错 (-5)
    Io,
    /// 介质损坏 (-84)
    Corrupt,
    /// 目录项不存在 (-2)
    NoEnt,
    /// 目录项已存在 (-17)
    Exist,
    /// 不是目录 (-20)
    NotDir,
    /// 是目录 (-21)
    IsDir,
    /// 目录非空 (-39)
    NotEmpty,
    /// 无效的文件句柄 (-9)
    BadF,
    /// 文件过大 (-27)
    FBig,
    /// 无效参数 (-22)
    Inval,
    /// 设备空间不足 (-28)
    NoSpc,
    /// 内存不足 (-12)
    NoMem,
    /// 没有数据或属性 (-61)
    NoAttr,
    /// 文件名过长 (-36)
    NameTooLong,
    /// 存储未就绪（SD 卡未插入或后端未挂载）(-99)
    NotReady,
}

impl VfsError {
    /// 转换为数值错误码（负数）
    pub fn code(&self) -> i32 {
        match self {
            VfsError::Io => -5,
            VfsError::Corrupt => -84,
            VfsError::NoEnt => -2,
            VfsError::Exist => -17,
            VfsError::NotDir => -20,
            VfsError::IsDir => -21,
            VfsError::NotEmpty => -39,
            VfsError::BadF => -9,
            VfsError::FBig => -27,
            VfsError::Inval => -22,
            VfsError::NoSpc => -28,
            VfsError::NoMem => -12,
            VfsError::NoAttr => -61,
            VfsError::NameTooLong => -36,
            VfsError::NotReady => -99,
        }
    }

    /// 从数值错误码还原，未知的码归为 [`VfsError::Inval`]
    pub fn from_code(code: i32) -> Self {
        match code {
            -5 => VfsError::Io,
            -84 => VfsError::Corrupt,
            -2 => VfsError::NoEnt,
            -17 => VfsError::Exist,
            -20 => VfsError::NotDir,
            -21 => VfsError::IsDir,
            -39 => VfsError::NotEmpty,
            -9 => VfsError::BadF,
            -27 => VfsError::FBig,
            -12 => VfsError::NoMem,
            -28 => VfsError::NoSpc,
            -61 => VfsError::NoAttr,
            -36 => VfsError::NameTooLong,
            -99 => VfsError::NotReady,
            _ => VfsError::Inval,
        }
    }

    /// 面向用户界面的提示文字
    pub fn message(&self) -> &'static str {
        match self {
            VfsError::NotReady => "No SD card",
            _ => "SD card error",
        }
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VfsError::Io => "I/O error",
            VfsError::Corrupt => "corrupted",
            VfsError::NoEnt => "no such file or directory",
            VfsError::Exist => "entry already exists",
            VfsError::NotDir => "not a directory",
            VfsError::IsDir => "is a directory",
            VfsError::NotEmpty => "directory not empty",
            VfsError::BadF => "bad file handle",
            VfsError::FBig => "file too large",
            VfsError::Inval => "invalid argument",
            VfsError::NoSpc => "no space left on device",
            VfsError::NoMem => "out of memory",
            VfsError::NoAttr => "no data available",
            VfsError::NameTooLong => "file name too long",
            VfsError::NotReady => "storage not ready",
        };
        write!(f, "{} ({})", msg, self.code())
    }
}

impl core::error::Error for VfsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for e in [
            VfsError::Io,
            VfsError::Corrupt,
            VfsError::NoEnt,
            VfsError::NotReady,
            VfsError::NameTooLong,
        ] {
            assert_eq!(VfsError::from_code(e.code()), e);
        }
        assert_eq!(VfsError::from_code(-1000), VfsError::Inval);
    }

    #[test]
    fn test_messages() {
        assert_eq!(VfsError::NotReady.message(), "No SD card");
        assert_eq!(VfsError::NoSpc.message(), "SD card error");
    }
}
