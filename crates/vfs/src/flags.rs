//! 打开标志与文件属性

use bitflags::bitflags;

bitflags! {
    /// 文件打开标志
    ///
    /// 创建方式之间在语义上互斥；`OPEN_APPEND` 的位包含 `OPEN_ALWAYS`，
    /// 判断时必须先检查 `OPEN_APPEND`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        /// 读
        const READ = 0x01;
        /// 写
        const WRITE = 0x02;
        /// 只打开已存在的文件（默认）
        const OPEN_EXISTING = 0x00;
        /// 创建新文件，已存在则失败
        const CREATE_NEW = 0x04;
        /// 创建文件，已存在则截断
        const CREATE_ALWAYS = 0x08;
        /// 打开文件，不存在则创建
        const OPEN_ALWAYS = 0x10;
        /// 打开或创建文件，并定位到末尾
        const OPEN_APPEND = 0x30;
    }
}

impl OpenFlags {
    /// 是否是追加模式（不能用 `contains(OPEN_ALWAYS)` 代替）
    pub fn is_append(&self) -> bool {
        self.contains(OpenFlags::OPEN_APPEND)
    }

    /// 是否请求了读或写权限
    pub fn has_access(&self) -> bool {
        self.intersects(OpenFlags::READ | OpenFlags::WRITE)
    }
}

bitflags! {
    /// 文件属性位（与 FAT 目录项属性一致）
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FileAttributes: u8 {
        /// 只读
        const RDO = 0x01;
        /// 隐藏
        const HID = 0x02;
        /// 系统
        const SYS = 0x04;
        /// 目录
        const DIR = 0x10;
        /// 归档
        const ARC = 0x20;
    }
}
