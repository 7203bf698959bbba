//! 跨后端的复制、重命名和移动
//!
//! 原生重命名不能跨后端，跨后端时退化为复制后删除源文件。这不是原子操作：
//! 复制成功、删除之前掉电会留下两份副本。复制中途出错时目标文件保留已写入的
//! 部分，由调用方决定是否删除。

use vfs::{Backend, OpenFlags, VfsError};

use crate::config::COPY_BUFFER_SIZE;
use crate::file::VfsFile;
use crate::service::{StorageService, Target};

impl StorageService {
    /// 重命名
    ///
    /// 两个路径属于同一后端时使用原生重命名（FAT 跨驱动器时返回
    /// [`VfsError::Inval`]），否则复制后删除源文件；复制失败时源文件保持不变。
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<(), VfsError> {
        let (old_backend, _) = self.classify(old_path)?;
        let (new_backend, _) = self.classify(new_path)?;
        if old_backend == new_backend {
            return match (self.target(old_path)?, self.target(new_path)?) {
                (Target::Fat(volume, from), Target::Fat(_, to)) => volume.rename(&from, &to),
                (Target::Lfs(volume, from), Target::Lfs(_, to)) => volume.rename(&from, &to),
                _ => Err(VfsError::Inval),
            };
        }
        if matches!(old_backend, Backend::Root | Backend::Unknown)
            || matches!(new_backend, Backend::Root | Backend::Unknown)
        {
            return Err(VfsError::Inval);
        }
        log::debug!("[Storage] cross-backend rename {} -> {}", old_path, new_path);
        self.copy_file(old_path, new_path)?;
        self.unlink(old_path)
    }

    /// 复制文件，目标必须不存在
    ///
    /// 任何出口都会关闭两个句柄；写入错误原样返回，卷满时为 [`VfsError::NoSpc`]。
    pub fn copy_file(&self, source: &str, destination: &str) -> Result<(), VfsError> {
        let mut src = self.open_file(source, OpenFlags::READ)?;
        let mut dest = self.open_file(destination, OpenFlags::CREATE_NEW | OpenFlags::WRITE)?;
        let copied = copy_contents(&mut src, &mut dest);
        let dest_closed = dest.close();
        let src_closed = src.close();
        copied.and(dest_closed).and(src_closed)
    }

    /// 按“文件名 + 目录”的形式复制文件
    pub fn copy_file_in(
        &self,
        src_file: &str,
        src_dir: &str,
        dest_dir: &str,
        dest_file: &str,
    ) -> Result<(), VfsError> {
        self.copy_file(
            &format!("{}/{}", src_dir, src_file),
            &format!("{}/{}", dest_dir, dest_file),
        )
    }

    /// 移动文件（复制后删除源文件），失败时返回面向用户的提示文字
    pub fn move_file(&self, source: &str, destination: &str) -> Result<(), &'static str> {
        self.copy_file(source, destination)
            .map_err(|e| e.message())?;
        self.unlink(source).map_err(|e| e.message())
    }

    /// 按“文件名 + 目录”的形式移动文件
    pub fn move_file_in(
        &self,
        src_file: &str,
        src_dir: &str,
        dest_file: &str,
        dest_dir: &str,
    ) -> Result<(), &'static str> {
        self.move_file(
            &format!("{}/{}", src_dir, src_file),
            &format!("{}/{}", dest_dir, dest_file),
        )
    }
}

fn copy_contents(src: &mut VfsFile<'_>, dest: &mut VfsFile<'_>) -> Result<(), VfsError> {
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    loop {
        let read = src.read(&mut buf)?;
        if read == 0 {
            return Ok(());
        }
        // 写入不完整时重试剩余部分，由后端报告真正的错误
        let mut pending = &buf[..read];
        while !pending.is_empty() {
            match dest.write(pending)? {
                0 => return Err(VfsError::NoSpc),
                n => pending = &pending[n..],
            }
        }
    }
}
