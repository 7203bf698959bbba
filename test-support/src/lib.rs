//! 测试支持 crate
//!
//! 提供测试日志捕获和确定性测试数据生成

pub mod logger;

/// 生成长度为 `len` 的确定性测试数据
///
/// 不同的 `seed` 生成不同的序列，序列周期不是 2 的幂，
/// 跨扇区、跨缓冲区边界的错位拷贝能被比较发现。
pub fn pattern(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|i| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((state >> 16) as u8) ^ (i % 253) as u8
        })
        .collect()
}
