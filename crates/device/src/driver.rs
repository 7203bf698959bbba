//! 设备驱动基础类型
//!
//! 块设备和 NOR Flash 共用的驱动接口

use alloc::string::String;

/// 设备类型枚举
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeviceType {
    /// 扇区寻址的块设备（SD 卡、FTL 之上的内部存储）
    Block,
    /// 原始 NOR Flash
    Flash,
}

/// 设备驱动程序特征
pub trait Driver: Send + Sync {
    /// 返回对应的设备类型，请参阅 DeviceType
    fn device_type(&self) -> DeviceType;

    /// 获取此设备的唯一标识符
    /// 每个实例的标识符应该不同
    fn get_id(&self) -> String;
}
