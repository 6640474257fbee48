//! 計算來源介面

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;

/// 批次計算來源：一次呼叫產生多個鍵的值
#[async_trait]
pub trait BulkProducer<K, V>: Send + Sync + 'static {
    async fn produce_all(&self) -> anyhow::Result<HashMap<K, V>>;
}

/// 逐鍵計算來源
#[async_trait]
pub trait KeyedProducer<K, V>: Send + Sync + 'static {
    async fn produce(&self, key: &K) -> anyhow::Result<V>;
}

/// 以閉包作為批次計算來源
pub struct BulkFn<F>(pub F);

#[async_trait]
impl<K, V, F, Fut> BulkProducer<K, V> for BulkFn<F>
where
    K: Send + 'static,
    V: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<HashMap<K, V>>> + Send,
{
    async fn produce_all(&self) -> anyhow::Result<HashMap<K, V>> {
        (self.0)().await
    }
}

/// 以閉包作為逐鍵計算來源
pub struct KeyedFn<F>(pub F);

#[async_trait]
impl<K, V, F, Fut> KeyedProducer<K, V> for KeyedFn<F>
where
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send,
{
    async fn produce(&self, key: &K) -> anyhow::Result<V> {
        (self.0)(key.clone()).await
    }
}
