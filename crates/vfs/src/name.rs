//! 文件名辅助函数
//!
//! 扩展名按“最后一个 `.` 且位于末尾 [`MAX_EXTENSION_LEN`] 个字节之内”识别，
//! 扩展名列表是若干扩展名直接拼接的字符串（例如 `.gif.jpg.jpeg.png`），从后向前搜索。

/// 扩展名（含 `.`）的最大字节数
pub const MAX_EXTENSION_LEN: usize = 5;

/// 路径中最后一个 `/` 之后的部分
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// 文件名的扩展名（含 `.`），没有时返回 `None`
pub fn file_extension(name: &str) -> Option<&str> {
    let bytes = name.as_bytes();
    let floor = bytes.len().saturating_sub(MAX_EXTENSION_LEN);
    (floor..bytes.len())
        .rev()
        .find(|&i| bytes[i] == b'.')
        .map(|i| &name[i..])
}

/// 去掉扩展名后的文件名
pub fn file_stem(name: &str) -> &str {
    match file_extension(name) {
        Some(ext) => &name[..name.len() - ext.len()],
        None => name,
    }
}

/// 从后向前逐个取出扩展名列表中的扩展名
pub fn pattern_extensions(pattern: &str) -> PatternExtensions<'_> {
    PatternExtensions { rest: pattern }
}

/// [`pattern_extensions`] 返回的迭代器
pub struct PatternExtensions<'a> {
    rest: &'a str,
}

impl<'a> Iterator for PatternExtensions<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let ext = file_extension(self.rest)?;
        self.rest = &self.rest[..self.rest.len() - ext.len()];
        Some(ext)
    }
}

/// 在扩展名列表中查找 `extension`（不区分大小写），返回列表中匹配的那一项
pub fn is_file_extension_matching<'a>(extension: &str, pattern: &'a str) -> Option<&'a str> {
    pattern_extensions(pattern).find(|ext| ext.eq_ignore_ascii_case(extension))
}

/// 解析扩展名前的数字编号
///
/// 返回编号开始的字节位置和编号值，例如 `"shot042.png"` 返回 `(4, 42)`；
/// 没有编号时位置就是扩展名的位置，值为 0。没有扩展名或文件名只有扩展名时返回 `None`。
pub fn file_index(name: &str) -> Option<(usize, u32)> {
    let stem = file_stem(name);
    if stem.len() == name.len() || stem.is_empty() {
        return None;
    }
    let digits = stem
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let start = stem.len() - digits;
    let value = stem[start..].bytes().fold(0u32, |acc, b| {
        acc.wrapping_mul(10).wrapping_add(u32::from(b - b'0'))
    });
    Some((start, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_basename() {
        assert_eq!(basename("/DEFAULT/MODELS/model1.yml"), "model1.yml");
        assert_eq!(basename("plain"), "plain");
        assert_eq!(basename("/dir/"), "");
    }

    #[test]
    fn test_file_extension_window() {
        assert_eq!(file_extension("photo.jpeg"), Some(".jpeg"));
        assert_eq!(file_extension("model.yml"), Some(".yml"));
        // 点在末尾 5 个字节之外
        assert_eq!(file_extension("archive.backup"), None);
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_stem("photo.jpeg"), "photo");
    }

    #[test]
    fn test_pattern_is_walked_backwards() {
        let exts: Vec<&str> = pattern_extensions(".gif.jpg.jpeg.png").collect();
        assert_eq!(exts, [".png", ".jpeg", ".jpg", ".gif"]);
    }

    #[test]
    fn test_extension_matching() {
        assert_eq!(is_file_extension_matching(".JPG", ".gif.jpg.png"), Some(".jpg"));
        assert_eq!(is_file_extension_matching(".bmp", ".gif.jpg.png"), None);
        assert_eq!(is_file_extension_matching(".yml", ".yml"), Some(".yml"));
    }

    #[test]
    fn test_file_index() {
        assert_eq!(file_index("shot042.png"), Some((4, 42)));
        assert_eq!(file_index("log.csv"), Some((3, 0)));
        assert_eq!(file_index("123.txt"), Some((0, 123)));
        assert_eq!(file_index("noext"), None);
        assert_eq!(file_index(".png"), None);
    }
}
