//! 文件元数据
//!
//! [`FileInfo`] 是按后端打标签的元数据快照：FAT 后端携带属性位和 16 位编码的
//! 修改日期时间，日志结构后端只有名字、大小和类型，根伪目录只有名字。
//! 所有访问器都对标签做穷尽匹配。

use alloc::string::String;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::flags::FileAttributes;

/// 目录项类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 目录
    Dir,
    /// 普通文件
    File,
}

/// FAT 后端的元数据
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FatStat {
    /// 文件名
    pub name: String,
    /// 文件大小（字节）
    pub size: u64,
    /// 属性位
    pub attrib: FileAttributes,
    /// 修改日期：`((年 - 1980) << 9) | (月 << 5) | 日`
    pub date: u16,
    /// 修改时间：`(时 << 11) | (分 << 5) | (秒 / 2)`
    pub time: u16,
}

/// 日志结构后端的元数据
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LfsStat {
    /// 文件名
    pub name: String,
    /// 文件大小（字节）
    pub size: u64,
    /// 是否为目录
    pub is_dir: bool,
}

/// 按后端打标签的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileInfo {
    /// 根伪目录中的条目（INTERNAL / SDCARD）
    Root {
        /// 条目名
        name: String,
    },
    /// FAT 后端
    Fat(FatStat),
    /// 日志结构后端
    Lfs(LfsStat),
}

impl FileInfo {
    /// 目录列举结束时返回的空条目
    pub fn end_of_dir() -> Self {
        FileInfo::Root {
            name: String::new(),
        }
    }

    /// 条目名，空字符串表示目录列举结束
    pub fn name(&self) -> &str {
        match self {
            FileInfo::Root { name } => name,
            FileInfo::Fat(stat) => &stat.name,
            FileInfo::Lfs(stat) => &stat.name,
        }
    }

    /// 文件大小，目录为 0
    pub fn size(&self) -> u64 {
        match self {
            FileInfo::Root { .. } => 0,
            FileInfo::Fat(stat) => stat.size,
            FileInfo::Lfs(stat) => stat.size,
        }
    }

    /// 条目类型
    pub fn file_type(&self) -> FileType {
        match self {
            FileInfo::Root { .. } => FileType::Dir,
            FileInfo::Fat(stat) if stat.attrib.contains(FileAttributes::DIR) => FileType::Dir,
            FileInfo::Fat(_) => FileType::File,
            FileInfo::Lfs(stat) if stat.is_dir => FileType::Dir,
            FileInfo::Lfs(_) => FileType::File,
        }
    }

    /// 是否为目录
    pub fn is_dir(&self) -> bool {
        self.file_type() == FileType::Dir
    }

    /// 属性位
    pub fn attributes(&self) -> FileAttributes {
        match self {
            FileInfo::Root { .. } => FileAttributes::DIR,
            FileInfo::Fat(stat) => stat.attrib,
            FileInfo::Lfs(stat) if stat.is_dir => FileAttributes::DIR,
            FileInfo::Lfs(_) => FileAttributes::empty(),
        }
    }

    /// FAT 编码的修改日期，没有时间戳的后端为 0
    pub fn date(&self) -> u16 {
        match self {
            FileInfo::Fat(stat) => stat.date,
            FileInfo::Root { .. } | FileInfo::Lfs(_) => 0,
        }
    }

    /// FAT 编码的修改时间，没有时间戳的后端为 0
    pub fn time(&self) -> u16 {
        match self {
            FileInfo::Fat(stat) => stat.time,
            FileInfo::Root { .. } | FileInfo::Lfs(_) => 0,
        }
    }

    /// 解码后的修改时间，没有时间戳或编码无效时返回 `None`
    pub fn modified(&self) -> Option<NaiveDateTime> {
        let (date, time) = (self.date(), self.time());
        if date == 0 {
            return None;
        }
        let day = NaiveDate::from_ymd_opt(
            1980 + i32::from(date >> 9),
            u32::from((date >> 5) & 0x0F),
            u32::from(date & 0x1F),
        )?;
        let clock = NaiveTime::from_hms_opt(
            u32::from(time >> 11),
            u32::from((time >> 5) & 0x3F),
            u32::from(time & 0x1F) * 2,
        )?;
        Some(NaiveDateTime::new(day, clock))
    }
}

/// 把日期编码为 FAT 16 位日期，1980 年之前的日期编码为 1980-01-01
pub fn fat_date(dt: &NaiveDateTime) -> u16 {
    if dt.year() < 1980 {
        return (1 << 5) | 1;
    }
    let year = (dt.year() - 1980).min(127) as u16;
    (year << 9) | ((dt.month() as u16) << 5) | dt.day() as u16
}

/// 把时间编码为 FAT 16 位时间（2 秒精度）
pub fn fat_time(dt: &NaiveDateTime) -> u16 {
    ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() / 2) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(13, 45, 30)
            .unwrap()
    }

    #[test]
    fn test_fat_encoding() {
        let dt = stamp();
        assert_eq!(fat_date(&dt), (44 << 9) | (5 << 5) | 17);
        assert_eq!(fat_time(&dt), (13 << 11) | (45 << 5) | 15);

        let info = FileInfo::Fat(FatStat {
            name: "a.txt".to_string(),
            size: 3,
            attrib: FileAttributes::ARC,
            date: fat_date(&dt),
            time: fat_time(&dt),
        });
        assert_eq!(info.modified(), Some(dt));
        assert_eq!(info.file_type(), FileType::File);
    }

    #[test]
    fn test_root_and_lfs_accessors() {
        let root = FileInfo::Root {
            name: "SDCARD".to_string(),
        };
        assert_eq!(root.file_type(), FileType::Dir);
        assert_eq!(root.size(), 0);
        assert_eq!(root.attributes(), FileAttributes::DIR);
        assert_eq!(root.modified(), None);

        let dir = FileInfo::Lfs(LfsStat {
            name: "LOGS".to_string(),
            size: 0,
            is_dir: true,
        });
        assert!(dir.is_dir());
        assert_eq!(dir.attributes(), FileAttributes::DIR);
        assert_eq!(dir.date(), 0);
    }

    #[test]
    fn test_end_of_dir_sentinel() {
        assert!(FileInfo::end_of_dir().name().is_empty());
    }
}
