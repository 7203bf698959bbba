//! 卷统计信息

/// 已挂载卷的容量统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeStats {
    /// 扇区大小（单位：字节）
    pub sector_size: usize,
    /// 总扇区数
    pub total_sectors: u64,
    /// 空闲扇区数
    pub free_sectors: u64,
}

impl VolumeStats {
    /// 总容量（字节）
    pub fn total_bytes(&self) -> u64 {
        self.total_sectors * self.sector_size as u64
    }

    /// 空闲容量（字节）
    pub fn free_bytes(&self) -> u64 {
        self.free_sectors * self.sector_size as u64
    }
}
