//! 测试日志
//!
//! 把 `log` 记录输出到 stderr，同时保存在捕获缓冲区中，
//! 测试可以断言某条警告确实被打印过。

use std::sync::{Mutex, Once};

use log::{Level, LevelFilter, Log, Metadata, Record};

static INIT: Once = Once::new();
static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());
static LOGGER: CaptureLogger = CaptureLogger;

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{:5}] {}", record.level(), record.args());
        eprintln!("{}", line);
        if let Ok(mut captured) = CAPTURED.lock() {
            captured.push(line);
        }
    }

    fn flush(&self) {}
}

/// 安装测试日志器，可重复调用
pub fn init() {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Debug);
        }
    });
}

/// 捕获到的全部日志行
pub fn captured() -> Vec<String> {
    CAPTURED.lock().map(|c| c.clone()).unwrap_or_default()
}

/// 是否有日志行包含 `needle`
pub fn contains(needle: &str) -> bool {
    CAPTURED
        .lock()
        .map(|c| c.iter().any(|line| line.contains(needle)))
        .unwrap_or(false)
}
