//! 元数据块的编码与解码
//!
//! 块 0 和块 1 组成元数据对，每次提交把整棵目录树写入较旧的一块。
//! 校验通过且修订号较新的一块有效，写了一半的块因校验失败被忽略。
//!
//! ```text
//! 偏移  长度  内容
//! 0     8     魔数 "littlefs"
//! 8     4     版本（高 16 位为主版本）
//! 12    4     修订号
//! 16    4     块大小
//! 20    4     块数
//! 24    4     目录树长度 n
//! 28    n     目录树
//! 28+n  4     前 28+n 字节的 CRC32
//! ```
//!
//! 目录编码为子项数 u32 加各子项。子项为类型 u8、名字长度 u8、名字；
//! 目录子项接着递归编码，文件子项接着大小 u64、块数 u32 和块号列表。
//! 所有整数均为小端序。

use std::collections::BTreeMap;

use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub(super) const MAGIC: [u8; 8] = *b"littlefs";
pub(super) const VERSION: u32 = 0x0001_0000;
pub(super) const HEADER_LEN: usize = 28;
const CRC_LEN: usize = 4;

const TAG_DIR: u8 = 1;
const TAG_FILE: u8 = 2;

/// 文件内容在 Flash 上的位置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct FileData {
    pub size: u64,
    /// 按文件内顺序排列的数据块
    pub blocks: Vec<u32>,
}

/// 目录树节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Node {
    File(FileData),
    Dir(BTreeMap<String, Node>),
}

/// 元数据块头中描述整个文件系统的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Superblock {
    pub rev: u32,
    pub block_size: u32,
    pub block_count: u32,
}

/// 修订号 `a` 是否比 `b` 新，按差值的符号比较以容忍回绕
pub(super) fn rev_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

/// 编码完整的元数据镜像
pub(super) fn encode(sb: &Superblock, root: &BTreeMap<String, Node>) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 256);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&sb.rev.to_le_bytes());
    out.extend_from_slice(&sb.block_size.to_le_bytes());
    out.extend_from_slice(&sb.block_count.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    encode_dir(root, &mut out);
    let body = (out.len() - HEADER_LEN) as u32;
    out[24..28].copy_from_slice(&body.to_le_bytes());
    let crc = CRC32.checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

fn encode_dir(children: &BTreeMap<String, Node>, out: &mut Vec<u8>) {
    out.extend_from_slice(&(children.len() as u32).to_le_bytes());
    for (name, node) in children {
        out.push(match node {
            Node::Dir(_) => TAG_DIR,
            Node::File(_) => TAG_FILE,
        });
        // 名字长度在路径解析时已限制为 255
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
        match node {
            Node::Dir(grandchildren) => encode_dir(grandchildren, out),
            Node::File(data) => {
                out.extend_from_slice(&data.size.to_le_bytes());
                out.extend_from_slice(&(data.blocks.len() as u32).to_le_bytes());
                for block in &data.blocks {
                    out.extend_from_slice(&block.to_le_bytes());
                }
            }
        }
    }
}

/// 从块头求出整个镜像的长度，魔数不对时返回 `None`
pub(super) fn image_len(header: &[u8]) -> Option<usize> {
    if header.len() < HEADER_LEN || header[..MAGIC.len()] != MAGIC {
        return None;
    }
    Some(HEADER_LEN + read_u32(header, 24) as usize + CRC_LEN)
}

/// 解码元数据镜像，校验失败或结构损坏时返回 `None`
pub(super) fn decode(image: &[u8]) -> Option<(Superblock, BTreeMap<String, Node>)> {
    let total = image_len(image)?;
    let (body, crc) = image.get(..total)?.split_at(total - CRC_LEN);
    if read_u32(crc, 0) != CRC32.checksum(body) || read_u32(body, 8) >> 16 != VERSION >> 16 {
        return None;
    }
    let sb = Superblock {
        rev: read_u32(body, 12),
        block_size: read_u32(body, 16),
        block_count: read_u32(body, 20),
    };
    let mut reader = Reader {
        bytes: &body[HEADER_LEN..],
        pos: 0,
    };
    let root = reader.dir()?;
    (reader.pos == reader.bytes.len()).then_some((sb, root))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let out = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|b| read_u32(b, 0))
    }

    fn u64(&mut self) -> Option<u64> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.take(8)?);
        Some(u64::from_le_bytes(word))
    }

    fn dir(&mut self) -> Option<BTreeMap<String, Node>> {
        let count = self.u32()?;
        let mut children = BTreeMap::new();
        for _ in 0..count {
            let tag = self.u8()?;
            let len = usize::from(self.u8()?);
            let name = core::str::from_utf8(self.take(len)?).ok()?.to_string();
            let node = match tag {
                TAG_DIR => Node::Dir(self.dir()?),
                TAG_FILE => {
                    let size = self.u64()?;
                    let blocks = self.u32()?;
                    let blocks = (0..blocks)
                        .map(|_| self.u32())
                        .collect::<Option<Vec<_>>>()?;
                    Node::File(FileData { size, blocks })
                }
                _ => return None,
            };
            if name.is_empty() || children.insert(name, node).is_some() {
                return None;
            }
        }
        Some(children)
    }
}
