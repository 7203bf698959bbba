//! 文件查找辅助函数：目录创建、存在性检查、扩展名模式和编号后缀

use vfs::name::{file_extension, file_index, file_stem, pattern_extensions};
use vfs::{FileAttributes, OpenFlags, VfsError};

use crate::service::{StorageService, Target};

impl StorageService {
    /// 确保目录存在，失败时返回面向用户的提示文字
    pub fn check_and_create_directory(&self, path: &str) -> Result<(), &'static str> {
        self.make_directory(path).map_err(|e| e.message())
    }

    /// 路径是否存在；`excl_dir` 为真时目录不算
    ///
    /// 根伪目录和无法路由的路径都返回 `false`。
    pub fn is_file_available(&self, path: &str, excl_dir: bool) -> bool {
        match self.target(path) {
            Ok(Target::Fat(volume, native)) => match volume.stat(&native) {
                Ok(stat) => !(excl_dir && stat.attrib.contains(FileAttributes::DIR)),
                Err(_) => false,
            },
            Ok(Target::Lfs(volume, native)) => match volume.open(&native, OpenFlags::READ) {
                Ok(file) => {
                    let _ = file.close();
                    true
                }
                Err(VfsError::IsDir) => !excl_dir,
                Err(_) => false,
            },
            Ok(Target::Root) | Err(_) => false,
        }
    }

    /// 在目录 `dir` 中查找文件 `file`
    ///
    /// 给出 `pattern` 时忽略 `file` 自带的扩展名，按扩展名列表从后向前逐个尝试。
    pub fn is_file_pattern_available(
        &self,
        dir: &str,
        file: &str,
        pattern: Option<&str>,
        excl_dir: bool,
    ) -> bool {
        match pattern {
            None => self.is_file_available(&format!("{}/{}", dir, file), excl_dir),
            Some(pattern) => self.find_file_pattern(dir, file, pattern, excl_dir).is_some(),
        }
    }

    /// 与 [`is_file_pattern_available`](Self::is_file_pattern_available) 相同，
    /// 返回第一个命中的扩展名
    pub fn find_file_pattern<'p>(
        &self,
        dir: &str,
        file: &str,
        pattern: &'p str,
        excl_dir: bool,
    ) -> Option<&'p str> {
        let base = format!("{}/{}", dir, file_stem(file));
        pattern_extensions(pattern)
            .find(|ext| self.is_file_available(&format!("{}{}", base, ext), excl_dir))
    }

    /// 为带编号后缀的文件名找到目录中下一个未使用的编号
    ///
    /// `filename` 被改写为使用新编号的文件名，编号不补零，例如 `shot03.png`
    /// 变为 `shot4.png`（已存在时继续递增）。新文件名超过 `max_len` 字节或文件名没有扩展名时返回 0。
    pub fn find_next_file_index(&self, filename: &mut String, max_len: usize, dir: &str) -> u32 {
        let Some((index_pos, mut index)) = file_index(filename) else {
            return 0;
        };
        let extension = file_extension(filename).unwrap_or_default().to_string();
        loop {
            index = index.wrapping_add(1);
            let candidate = format!("{}{}{}", &filename[..index_pos], index, extension);
            if candidate.len() > max_len {
                return 0;
            }
            *filename = candidate;
            if !self.is_file_pattern_available(dir, filename, None, false) {
                return index;
            }
        }
    }
}
