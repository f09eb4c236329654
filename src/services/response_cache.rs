//! 注释缓存
//!
//! 进程级共享的 指纹 → 注释 映射。每次上传新文档时 `clear_all()` 会推进代次，
//! 键中带有代次，旧代次的条目对新文档不可见，旧代次的写入也会被拒绝。
//!
//! 同一 (代次, 指纹) 的并发请求由 moka 合并，只有一个真正执行。

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use moka::future::Cache;
use tracing::debug;

/// 文档代次，每次上传 +1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 缓存指纹：图片 id + AI 提示词
///
/// 结构化存储，不同组合之间不会冲突
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub image_id: u32,
    pub prompt: String,
}

impl Fingerprint {
    pub fn new(image_id: u32, prompt: impl Into<String>) -> Self {
        Self {
            image_id,
            prompt: prompt.into(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img_{}_{}", self.image_id, STANDARD.encode(&self.prompt))
    }
}

/// 不应写入缓存的结果（错误提示、过期代次算出的结果），原样返回给调用方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uncacheable(pub String);

/// 注释缓存
pub struct ResponseCache {
    entries: Cache<(Generation, Fingerprint), String>,
    generation: AtomicU64,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    /// 创建空缓存（不限容量，不过期）
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().name("annotation-cache").build(),
            generation: AtomicU64::new(0),
        }
    }

    /// 当前代次
    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }

    fn is_current(&self, generation: Generation) -> bool {
        self.generation() == generation
    }

    /// 查询缓存，代次过期时视为未命中
    pub async fn get(&self, generation: Generation, fingerprint: &Fingerprint) -> Option<String> {
        if !self.is_current(generation) {
            return None;
        }
        self.entries
            .get(&(generation, fingerprint.clone()))
            .await
    }

    /// 写入缓存，代次过期时丢弃并返回 false
    pub async fn put(&self, generation: Generation, fingerprint: Fingerprint, value: String) -> bool {
        if !self.is_current(generation) {
            debug!("代次 {} 已过期，丢弃缓存写入: {}", generation, fingerprint);
            return false;
        }
        self.entries.insert((generation, fingerprint), value).await;
        true
    }

    /// 清空缓存并推进代次，返回新代次
    pub fn clear_all(&self) -> Generation {
        let next = Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
        self.entries.invalidate_all();
        next
    }

    /// 查询缓存，未命中时执行 `compute` 并写入
    ///
    /// - `compute` 返回 `Err(Uncacheable)` 时结果不写入缓存
    /// - 计算完成时代次已变化的结果同样不写入
    /// - 同一键的并发调用只执行一次 `compute`，其余调用共享结果
    pub async fn get_or_compute<F>(
        &self,
        generation: Generation,
        fingerprint: Fingerprint,
        compute: F,
    ) -> String
    where
        F: Future<Output = Result<String, Uncacheable>>,
    {
        if !self.is_current(generation) {
            debug!("代次 {} 已过期，跳过缓存: {}", generation, fingerprint);
            return match compute.await {
                Ok(value) | Err(Uncacheable(value)) => value,
            };
        }

        let key_label = fingerprint.to_string();
        let init = async {
            let value = compute.await?;
            if !self.is_current(generation) {
                debug!("代次 {} 在计算期间过期，结果不缓存: {}", generation, key_label);
                return Err(Uncacheable(value));
            }
            Ok::<_, Uncacheable>(value)
        };

        match self
            .entries
            .entry((generation, fingerprint))
            .or_try_insert_with(init)
            .await
        {
            Ok(entry) => {
                if entry.is_fresh() {
                    debug!("已缓存注释: {}", key_label);
                } else {
                    debug!("缓存命中: {}", key_label);
                }
                entry.into_value()
            }
            Err(uncached) => uncached.0.clone(),
        }
    }
}
