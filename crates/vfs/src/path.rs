//! 路径规范化引擎
//!
//! 该模块负责把调用方给出的路径字符串转换为规范的绝对路径，之后才交给挂载表分类。
//!
//! 支持的典型语义：
//!
//! - 绝对路径以 `/` 开头；相对路径先拼接到“当前工作目录”之后
//! - `.` 表示当前目录，解析时跳过；`..` 表示父目录，在根目录处保持不动
//! - 连续的 `/` 视为一个分隔符，结果中不含空组件和末尾的 `/`
//!
//! 规范化是幂等的：对已规范化的路径再次规范化得到相同的字符串。

use alloc::string::String;
use alloc::vec::Vec;

use crate::VfsError;

/// 单个路径组件的最大字节数
pub const MAX_NAME_LEN: usize = 255;

/// 路径组件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathComponent {
    /// 根目录 "/"
    Root,
    /// 当前目录 "."
    Current,
    /// 父目录 ".."
    Parent,
    /// 正常的文件名
    Normal(String),
}

/// 将路径字符串解析为组件列表，空组件被忽略
pub fn parse_path(path: &str) -> Vec<PathComponent> {
    let root = path.starts_with('/').then_some(PathComponent::Root);
    let parts = path
        .split('/')
        .filter(|part| !part.is_empty())
        .map(|part| match part {
            "." => PathComponent::Current,
            ".." => PathComponent::Parent,
            name => PathComponent::Normal(String::from(name)),
        });
    root.into_iter().chain(parts).collect()
}

/// 规范化路径（处理 `..` 和 `.`）
///
/// 绝对路径中的 `..` 在根目录处被丢弃；相对路径中无法抵消的 `..` 保留在开头。
pub fn normalize_path(path: &str) -> String {
    let mut absolute = false;
    let mut stack: Vec<String> = Vec::new();
    for component in parse_path(path) {
        match component {
            PathComponent::Root => absolute = true,
            PathComponent::Current => {}
            PathComponent::Parent => match stack.last() {
                Some(last) if last != ".." => {
                    stack.pop();
                }
                _ if absolute => {}
                _ => stack.push(String::from("..")),
            },
            PathComponent::Normal(name) => stack.push(name),
        }
    }
    match (absolute, stack.is_empty()) {
        (true, _) => alloc::format!("/{}", stack.join("/")),
        (false, true) => String::from("."),
        (false, false) => stack.join("/"),
    }
}

/// 相对于工作目录 `cwd` 解析路径，返回规范的绝对路径
///
/// 任何组件超过 [`MAX_NAME_LEN`] 字节时返回 [`VfsError::NameTooLong`]。
pub fn resolve_path(cwd: &str, path: &str) -> Result<String, VfsError> {
    let joined;
    let full = if path.starts_with('/') {
        path
    } else {
        joined = alloc::format!("/{}/{}", cwd, path);
        joined.as_str()
    };
    let normalized = normalize_path(full);
    if normalized.split('/').any(|seg| seg.len() > MAX_NAME_LEN) {
        return Err(VfsError::NameTooLong);
    }
    Ok(normalized)
}
