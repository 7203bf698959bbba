//! `fatfs` 错误到 [`VfsError`] 的翻译
//!
//! `fatfs` 只给出 `io::Error`，部分错误只能从消息文本区分。块设备错误在
//! [`BlockIo`](super::BlockIo) 中被包装，这里优先取回。

use std::io;

use device::BlockError;
use vfs::VfsError;

use super::block_error;

/// 翻译 `fatfs` 返回的错误
pub fn translate(err: io::Error) -> VfsError {
    if let Some(block) = block_error(&err) {
        return match block {
            BlockError::NotReady => VfsError::NotReady,
            _ => VfsError::Io,
        };
    }
    match err.kind() {
        io::ErrorKind::NotFound => VfsError::NoEnt,
        io::ErrorKind::AlreadyExists => VfsError::Exist,
        io::ErrorKind::InvalidInput => VfsError::Inval,
        io::ErrorKind::InvalidData => VfsError::Corrupt,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => VfsError::Io,
        _ => translate_message(&err.to_string()),
    }
}

fn translate_message(message: &str) -> VfsError {
    let message = message.to_ascii_lowercase();
    if message.contains("not empty") {
        VfsError::NotEmpty
    } else if message.contains("is a directory") {
        VfsError::IsDir
    } else if message.contains("not a directory") {
        VfsError::NotDir
    } else if message.contains("no space") {
        VfsError::NoSpc
    } else {
        log::debug!("[FAT] untranslated error: {}", message);
        VfsError::Inval
    }
}
