//! 存储配置
//!
//! 存储布局在集成时选定；具体设备由 [`StorageMedia`] 交给服务对象。

use std::fmt;
use std::sync::Arc;

use device::{BlockDriver, NorFlash};
use fs::LfsDriver;
use ftl::FtlConfig;
use vfs::{InternalFormat, StorageLayout, VfsError};

/// 跨后端复制时的缓冲区大小（字节）
pub const COPY_BUFFER_SIZE: usize = 256;

/// 启动时在 `/DEFAULT` 下创建的目录
pub const WELL_KNOWN_DIRS: [&str; 5] = ["RADIO", "MODELS", "LOGS", "SCREENSHOTS", "BACKUP"];

/// 存储服务配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// 存储布局
    pub layout: StorageLayout,
    /// 内部 FAT 使用的 FTL 参数
    pub ftl: FtlConfig,
}

impl StorageConfig {
    /// 使用默认 FTL 参数
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            ftl: FtlConfig::default(),
        }
    }
}

/// 内部存储介质
pub enum InternalMedia {
    /// 裸 NOR Flash，上面建 FTL 和 FAT
    Fat(Box<dyn NorFlash>),
    /// 日志结构文件系统的原生驱动
    LittleFs(Box<dyn LfsDriver>),
}

impl InternalMedia {
    fn format(&self) -> InternalFormat {
        match self {
            InternalMedia::Fat(_) => InternalFormat::Fat,
            InternalMedia::LittleFs(_) => InternalFormat::LittleFs,
        }
    }
}

impl fmt::Debug for InternalMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternalMedia::{:?}", self.format())
    }
}

/// 交给存储服务的具体设备
#[derive(Default)]
pub struct StorageMedia {
    /// SD 卡块设备
    pub sdcard: Option<Arc<dyn BlockDriver>>,
    /// 内部存储介质
    pub internal: Option<InternalMedia>,
}

impl StorageMedia {
    /// 检查设备与存储布局是否一致
    pub(crate) fn check(&self, layout: StorageLayout) -> Result<(), VfsError> {
        let internal = self.internal.as_ref().map(InternalMedia::format);
        if layout.has_sdcard() != self.sdcard.is_some() || layout.internal() != internal {
            log::error!("[Storage] media do not match layout {:?}", layout);
            return Err(VfsError::Inval);
        }
        Ok(())
    }
}
