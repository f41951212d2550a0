//! 数据报载荷
//!
//! 以若干分片（view）的形式承载一个数据报的字节，对应收包路径上的分散缓冲区。

/// 分片载荷
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    views: Vec<Vec<u8>>,
}

impl Payload {
    /// 由多个分片构造
    pub fn from_views(views: Vec<Vec<u8>>) -> Self {
        Self { views }
    }

    /// 总字节数
    pub fn size(&self) -> usize {
        self.views.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn views(&self) -> &[Vec<u8>] {
        &self.views
    }

    /// 拼接为连续字节
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        for v in &self.views {
            out.extend_from_slice(v);
        }
        out
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self { views: vec![bytes] }
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::from(bytes.to_vec())
    }
}
