//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存键的构造与规范化规则。
//!
//! 键由 `:` 分隔的段组成，第一段是类型标识（同时作为指标端点）。
//! 与文化上下文相关的键遵循固定的段顺序：
//!
//! ```text
//! {data_type}:{community}:{region}:{language}:{discriminator...}
//! ```
//!
//! 例如 `cal:buddhist:sri_lanka:si:2024-04-23`。

use crate::error::{CacheError, Result};
use std::fmt;

/// 键段分隔符
pub const SEGMENT_SEPARATOR: char = ':';

/// `None` 值的占位段，任何 `Some` 值编码后都不会等于它
pub const NONE_SEGMENT: &str = "~";

/// 上下文键的最少段数（类型、社区、地区、语言、区分段）
pub const SCOPED_KEY_MIN_SEGMENTS: usize = 5;

/// 规范化单个键段
///
/// 去除首尾空白并转为小写；`%`、`~`、分隔符、空白、控制字符与Redis glob元字符
/// 按UTF-8字节转义为 `%XX`。转义是单射的，不同的原始值得到不同的段，
/// 且编码结果不含分隔符和glob元字符。键构造和失效模式构造共用此规则。
pub fn normalize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn needs_escape(c: char) -> bool {
    matches!(c, '%' | '~' | ':' | '*' | '?' | '[' | ']' | '\\') || c.is_whitespace() || c.is_control()
}

/// 缓存键
///
/// 由查询的识别字段确定性地派生
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// 开始构造一个以 `discriminator` 为类型前缀的键
    pub fn builder(discriminator: &str) -> KeyBuilder {
        KeyBuilder::new(discriminator)
    }

    /// 包装一个已经构造好的键字符串
    ///
    /// 空键或纯空白键返回 `InvalidArgument`
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate_key(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 类型标识段
    pub fn discriminator(&self) -> &str {
        discriminator_of(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// 校验原始键
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(CacheError::InvalidArgument(
            "Cache key cannot be null or empty".to_string(),
        ));
    }
    Ok(())
}

/// 取键的第一段
pub(crate) fn discriminator_of(key: &str) -> &str {
    key.split(SEGMENT_SEPARATOR).next().unwrap_or(key)
}

/// 键构造器
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    segments: Vec<String>,
}

impl KeyBuilder {
    pub fn new(discriminator: &str) -> Self {
        Self {
            segments: vec![normalize_segment(discriminator)],
        }
    }

    /// 追加一个识别段
    pub fn segment<S: KeySegment + ?Sized>(mut self, value: &S) -> Self {
        self.segments.push(value.encoded_segment());
        self
    }

    /// 按上下文键布局依次追加社区、地区和语言段
    pub fn scope<S: KeySegment + ?Sized>(
        self,
        community: &str,
        region: &str,
        language: Option<&S>,
    ) -> Self {
        self.segment(community)
            .segment(region)
            .segment(&language.map(|l| l.key_segment()))
    }

    pub fn build(self) -> CacheKey {
        CacheKey(self.segments.join(":"))
    }
}

/// 可作为键段的值
pub trait KeySegment {
    fn key_segment(&self) -> String;

    /// 写入键中的编码形式
    fn encoded_segment(&self) -> String {
        normalize_segment(&self.key_segment())
    }
}

macro_rules! display_segment {
    ($($t:ty),* $(,)?) => {
        $(
            impl KeySegment for $t {
                fn key_segment(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_segment!(
    str, String, bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize,
    uuid::Uuid
);

impl KeySegment for chrono::NaiveDate {
    fn key_segment(&self) -> String {
        self.format("%Y-%m-%d").to_string()
    }
}

impl KeySegment for chrono::DateTime<chrono::Utc> {
    fn key_segment(&self) -> String {
        // 冒号会被转义，这里直接使用紧凑格式
        self.format("%Y%m%dT%H%M%SZ").to_string()
    }
}

impl<T: KeySegment + ?Sized> KeySegment for &T {
    fn key_segment(&self) -> String {
        (**self).key_segment()
    }

    fn encoded_segment(&self) -> String {
        (**self).encoded_segment()
    }
}

impl<T: KeySegment> KeySegment for Option<T> {
    fn key_segment(&self) -> String {
        match self {
            Some(v) => v.key_segment(),
            None => NONE_SEGMENT.to_string(),
        }
    }

    fn encoded_segment(&self) -> String {
        match self {
            Some(v) => v.encoded_segment(),
            None => NONE_SEGMENT.to_string(),
        }
    }
}
