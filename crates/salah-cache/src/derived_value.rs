//! 衍生值快取
//!
//! 對非同步計算來源做三件事：
//! - 同一個冷鍵同時只會有一次計算（single-flight），所有等待者共用結果
//! - 結果依鍵記憶；批次來源一次呼叫的結果會分發到所有鍵
//! - 明確失效：`invalidate` / `invalidate_all` / `clear`
//!
//! 狀態轉移都在同一把互斥鎖內完成，Idle → Pending 只會發生一次。
//! 計算在 tokio 任務中執行，等待者離開（例如逾時）不會中斷計算，
//! 計算完成後仍會寫回快取。
//!
//! 失效以邏輯時鐘判斷：派送後才被失效的項目，不會被該次計算的結果寫回，
//! 但已在等待該次計算的呼叫者仍會拿到它的結果。
//! 項目被移除（`retain`、找不到的鍵）後，較早派送的計算也不會再把它加回來。

use futures::future::{BoxFuture, FutureExt, Shared};
use salah_core::{Result, SalahError};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::producer::{BulkProducer, KeyedProducer};

type FlightOutput<K, V> = Result<Arc<HashMap<K, V>>>;
type Flight<K, V> = Shared<BoxFuture<'static, FlightOutput<K, V>>>;
type ProduceFuture<K, V> = BoxFuture<'static, anyhow::Result<HashMap<K, V>>>;

/// 快取項目狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Idle,
    Pending,
    Ready,
    Failed,
}

enum EntryState<K, V> {
    Idle,
    Pending { flight_id: u64, flight: Flight<K, V> },
    Ready { value: V, produced_by: u64 },
    Failed(SalahError),
}

struct Entry<K, V> {
    state: EntryState<K, V>,
    invalidated_at: u64,
}

impl<K, V> Entry<K, V> {
    fn idle() -> Self {
        Self::idle_since(0)
    }

    /// 新建項目沿用移除時點，之前派送的計算不會寫入
    fn idle_since(invalidated_at: u64) -> Self {
        Self {
            state: EntryState::Idle,
            invalidated_at,
        }
    }

    fn is_pending_on(&self, id: u64) -> bool {
        matches!(self.state, EntryState::Pending { flight_id, .. } if flight_id == id)
    }

    fn status(&self) -> EntryStatus {
        match self.state {
            EntryState::Idle => EntryStatus::Idle,
            EntryState::Pending { .. } => EntryStatus::Pending,
            EntryState::Ready { .. } => EntryStatus::Ready,
            EntryState::Failed(_) => EntryStatus::Failed,
        }
    }
}

struct BulkFlight<K, V> {
    id: u64,
    flight: Flight<K, V>,
}

struct CacheState<K, V> {
    entries: HashMap<K, Entry<K, V>>,

    /// 進行中的批次計算（僅批次模式）
    bulk_flight: Option<BulkFlight<K, V>>,

    /// 邏輯時鐘：每次派送與失效都遞增
    clock: u64,

    /// 最近一次全部失效的時點
    cleared_at: u64,

    /// 最近一次移除項目的時點，更早派送的計算不得新增項目
    pruned_at: u64,
}

impl<K, V> CacheState<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            bulk_flight: None,
            clock: 0,
            cleared_at: 0,
            pruned_at: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// 計算完成：更新等待中的項目，並把結果分發到其他鍵
    fn settle(&mut self, name: &str, flight_id: u64, outcome: &FlightOutput<K, V>) {
        if self
            .bulk_flight
            .as_ref()
            .is_some_and(|bulk| bulk.id == flight_id)
        {
            self.bulk_flight = None;
        }

        let values = match outcome {
            Ok(values) => values,
            Err(err) => {
                let mut failed = 0;
                for entry in self.entries.values_mut() {
                    if entry.is_pending_on(flight_id) {
                        entry.state = EntryState::Failed(err.clone());
                        failed += 1;
                    }
                }
                tracing::warn!(
                    "{}: 計算 #{} 失敗，{} 個鍵受影響: {}",
                    name,
                    flight_id,
                    failed,
                    err
                );
                return;
            }
        };

        // 找不到的鍵不留項目，等待者已從計算結果得到 NotFound
        let mut missing = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if !entry.is_pending_on(flight_id) {
                continue;
            }
            match values.get(key) {
                Some(value) => {
                    entry.state = EntryState::Ready {
                        value: value.clone(),
                        produced_by: flight_id,
                    };
                }
                None => missing.push(key.clone()),
            }
        }
        if !missing.is_empty() {
            for key in &missing {
                self.entries.remove(key);
            }
            self.pruned_at = self.pruned_at.max(flight_id);
        }

        // 派送後整個快取被清除過，不再寫回任何值
        if self.cleared_at > flight_id {
            tracing::debug!("{}: 計算 #{} 完成，但快取已清除", name, flight_id);
            return;
        }

        let mut fanned_out = 0;
        for (key, value) in values.iter() {
            match self.entries.get_mut(key) {
                Some(entry) => {
                    if entry.invalidated_at > flight_id {
                        continue;
                    }
                    let replace = match &entry.state {
                        EntryState::Idle | EntryState::Failed(_) => true,
                        EntryState::Ready { produced_by, .. } => *produced_by < flight_id,
                        EntryState::Pending { .. } => false,
                    };
                    if replace {
                        entry.state = EntryState::Ready {
                            value: value.clone(),
                            produced_by: flight_id,
                        };
                        fanned_out += 1;
                    }
                }
                None if flight_id >= self.pruned_at => {
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            state: EntryState::Ready {
                                value: value.clone(),
                                produced_by: flight_id,
                            },
                            invalidated_at: 0,
                        },
                    );
                    fanned_out += 1;
                }
                None => {}
            }
        }

        tracing::debug!(
            "{}: 計算 #{} 完成，{} 個值，分發 {} 個，缺少 {} 個",
            name,
            flight_id,
            values.len(),
            fanned_out,
            missing.len()
        );
    }
}

enum Source<K, V> {
    Bulk(Arc<dyn BulkProducer<K, V>>),
    Keyed(Arc<dyn KeyedProducer<K, V>>),
}

impl<K, V> Clone for Source<K, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Bulk(producer) => Self::Bulk(Arc::clone(producer)),
            Self::Keyed(producer) => Self::Keyed(Arc::clone(producer)),
        }
    }
}

enum Lookup<K, V> {
    Ready(V),
    Wait(Flight<K, V>),
}

/// 衍生值快取
///
/// clone 後共用同一份狀態。計算會以 `tokio::spawn` 派送，
/// 必須在 tokio runtime 內呼叫 `get_or_compute` / `precompute_all`。
pub struct DerivedValueCache<K, V> {
    name: Arc<str>,
    source: Source<K, V>,
    state: Arc<Mutex<CacheState<K, V>>>,
}

impl<K, V> Clone for DerivedValueCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            source: self.source.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<K, V> DerivedValueCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// 批次模式：一次計算產生所有鍵的值
    pub fn bulk(name: impl Into<Arc<str>>, producer: impl BulkProducer<K, V>) -> Self {
        Self::with_source(name.into(), Source::Bulk(Arc::new(producer)))
    }

    /// 逐鍵模式：每個鍵各自計算
    pub fn keyed(name: impl Into<Arc<str>>, producer: impl KeyedProducer<K, V>) -> Self {
        Self::with_source(name.into(), Source::Keyed(Arc::new(producer)))
    }

    fn with_source(name: Arc<str>, source: Source<K, V>) -> Self {
        Self {
            name,
            source,
            state: Arc::new(Mutex::new(CacheState::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 取得值；冷鍵觸發計算，計算中的鍵共用同一次計算
    pub async fn get_or_compute(&self, key: &K) -> Result<V> {
        let flight = match self.lookup(key) {
            Lookup::Ready(value) => return Ok(value),
            Lookup::Wait(flight) => flight,
        };

        let values = flight.await?;
        values.get(key).cloned().ok_or_else(|| not_found(key))
    }

    /// 已就緒的值（不觸發計算）
    pub fn peek(&self, key: &K) -> Option<V> {
        let state = self.lock();
        match state.entries.get(key).map(|entry| &entry.state) {
            Some(EntryState::Ready { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    /// 項目狀態（未出現過的鍵視為 Idle）
    pub fn status(&self, key: &K) -> EntryStatus {
        self.lock()
            .entries
            .get(key)
            .map_or(EntryStatus::Idle, Entry::status)
    }

    /// 失效單一鍵
    ///
    /// 進行中的計算不會取消，但其結果不會再寫回這個鍵；
    /// 下一次 `get_or_compute` 會重新計算。
    pub fn invalidate(&self, key: &K) {
        let mut state = self.lock();
        let at = state.tick();
        let entry = state.entries.entry(key.clone()).or_insert_with(Entry::idle);
        entry.state = EntryState::Idle;
        entry.invalidated_at = at;
        tracing::debug!("{}: 失效 {:?}", self.name, key);
    }

    /// 失效所有鍵
    pub fn invalidate_all(&self) {
        let mut state = self.lock();
        Self::reset_all(&mut state);
        tracing::debug!("{}: 全部失效（{} 個鍵）", self.name, state.entries.len());
    }

    /// 清除所有項目（登出或切換帳號時使用），進行中的計算不會寫回
    pub fn clear(&self) {
        let mut state = self.lock();
        Self::reset_all(&mut state);
        state.entries.clear();
        tracing::info!("{}: 快取已清除", self.name);
    }

    /// 移除不符合條件的項目（計算中的項目保留）
    ///
    /// 移除前已派送的計算完成後，不會把被移除的鍵加回來。
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, entry| {
            matches!(entry.state, EntryState::Pending { .. }) || keep(key)
        });
        if state.entries.len() < before {
            state.pruned_at = state.tick();
        }
    }

    /// 批次預先計算所有鍵，回傳取得的值數量
    pub async fn precompute_all(&self) -> Result<usize> {
        let flight = {
            let Source::Bulk(producer) = &self.source else {
                return Err(SalahError::InvalidConfig(format!(
                    "{}: 逐鍵模式不支援批次預先計算",
                    self.name
                )));
            };

            let mut guard = self.lock();
            let state = &mut *guard;
            match &state.bulk_flight {
                Some(bulk) if bulk.id > state.cleared_at => bulk.flight.clone(),
                _ => {
                    let produce = bulk_future(producer);
                    self.dispatch(state, produce).1
                }
            }
        };

        Ok(flight.await?.len())
    }

    /// 目前項目數量
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &K) -> Lookup<K, V> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let cleared_at = state.cleared_at;
        let pruned_at = state.pruned_at;

        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::idle_since(pruned_at));
        match &entry.state {
            EntryState::Ready { value, .. } => return Lookup::Ready(value.clone()),
            EntryState::Pending { flight, .. } => return Lookup::Wait(flight.clone()),
            EntryState::Idle | EntryState::Failed(_) => {}
        }
        let invalidated_at = entry.invalidated_at.max(cleared_at);

        // 進行中的批次計算若在此鍵失效之後才派送，可以直接共用
        let shared = state
            .bulk_flight
            .as_ref()
            .filter(|bulk| bulk.id > invalidated_at)
            .map(|bulk| (bulk.id, bulk.flight.clone()));

        let (flight_id, flight) = match shared {
            Some(found) => found,
            None => {
                let produce = self.produce_future(key);
                self.dispatch(state, produce)
            }
        };

        if let Some(entry) = state.entries.get_mut(key) {
            entry.state = EntryState::Pending {
                flight_id,
                flight: flight.clone(),
            };
        }

        Lookup::Wait(flight)
    }

    fn produce_future(&self, key: &K) -> ProduceFuture<K, V> {
        match &self.source {
            Source::Bulk(producer) => bulk_future(producer),
            Source::Keyed(producer) => {
                let producer = Arc::clone(producer);
                let key = key.clone();
                async move {
                    let value = producer.produce(&key).await?;
                    Ok(HashMap::from([(key, value)]))
                }
                .boxed()
            }
        }
    }

    /// 派送一次計算（呼叫端持有鎖）
    fn dispatch(
        &self,
        state: &mut CacheState<K, V>,
        produce: ProduceFuture<K, V>,
    ) -> (u64, Flight<K, V>) {
        let flight_id = state.tick();
        let shared_state = Arc::downgrade(&self.state);
        let name = Arc::clone(&self.name);

        tracing::debug!("{}: 派送計算 #{}", self.name, flight_id);

        let task = tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(produce).catch_unwind().await {
                Ok(Ok(values)) => Ok(Arc::new(values)),
                Ok(Err(err)) => Err(SalahError::producer(err)),
                Err(_) => Err(SalahError::producer(anyhow::anyhow!("計算來源發生 panic"))),
            };

            match shared_state.upgrade() {
                Some(state) => lock_state(&state).settle(&name, flight_id, &outcome),
                None => tracing::debug!("{}: 快取已釋放，略過寫回 #{}", name, flight_id),
            }

            outcome
        });

        let flight = async move {
            task.await.unwrap_or_else(|err| {
                Err(SalahError::producer(anyhow::anyhow!("計算任務中止: {err}")))
            })
        }
        .boxed()
        .shared();

        if matches!(self.source, Source::Bulk(_)) {
            state.bulk_flight = Some(BulkFlight {
                id: flight_id,
                flight: flight.clone(),
            });
        }

        (flight_id, flight)
    }

    fn reset_all(state: &mut CacheState<K, V>) {
        let at = state.tick();
        state.cleared_at = at;
        state.bulk_flight = None;
        for entry in state.entries.values_mut() {
            entry.state = EntryState::Idle;
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        lock_state(&self.state)
    }
}

fn bulk_future<K, V>(producer: &Arc<dyn BulkProducer<K, V>>) -> ProduceFuture<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    let producer = Arc::clone(producer);
    async move { producer.produce_all().await }.boxed()
}

fn lock_state<K, V>(state: &Mutex<CacheState<K, V>>) -> MutexGuard<'_, CacheState<K, V>> {
    // 鎖內不會 panic，中毒時沿用內部狀態
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found<K: Debug>(key: &K) -> SalahError {
    SalahError::NotFound(format!("{key:?}"))
}
