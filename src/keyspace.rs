//! The authoritative key→Value map, coordinated with the recency index and
//! membership filter under one readers-writer lock. A single flat
//! keyspace — no `SELECT`, no per-database split — plus the eviction and
//! filter sidecars that keep it bounded.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::EngineError;
use crate::filter::MembershipFilter;
use crate::recency::RecencyIndex;
use crate::value::{Bytes, Value};

/// The inner, single-threaded-assumption structure; all synchronization
/// lives one level up in `Store`.
struct Keyspace {
    map: HashMap<Bytes, Value>,
    recency: RecencyIndex,
    filter: MembershipFilter,
    capacity: usize,
}

impl Keyspace {
    fn new(capacity: usize, filter_bits: usize) -> Self {
        Keyspace {
            map: HashMap::new(),
            recency: RecencyIndex::new(),
            filter: MembershipFilter::new(filter_bits),
            capacity,
        }
    }

    /// Repeatedly evict the coldest key until the live-key count is back
    /// within capacity. The membership filter is left untouched: it is
    /// additive-only and never shrinks on eviction.
    fn evict_to_capacity(&mut self) {
        while self.recency.len() > self.capacity {
            let Ok(oldest) = self.recency.oldest() else {
                break;
            };
            let oldest = oldest.to_vec();
            self.map.remove(&oldest);
            self.recency.forget(&oldest);
        }
    }

    /// Remove `key` if its bound value is an aggregate that has become
    /// empty.
    fn drop_if_emptied(&mut self, key: &[u8]) {
        let emptied = self.map.get(key).map(|v| v.is_empty_aggregate()).unwrap_or(false);
        if emptied {
            self.map.remove(key);
            self.recency.forget(key);
        }
    }

    // ---- String ----

    fn set(&mut self, key: &[u8], val: Bytes) {
        // Unconditional rebind regardless of the key's prior variant.
        self.map.insert(key.to_vec(), Value::Str(val));
        self.filter.add(key);
        self.recency.touch(key);
        self.evict_to_capacity();
    }

    /// GET is the one read that touches recency: it acquires the exclusive
    /// lock at the `Store` layer and updates recency here. Every other
    /// inspection operation below takes the shared lock and leaves recency
    /// alone.
    fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(None);
        }
        match self.map.get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => {
                let s = s.clone();
                self.recency.touch(key);
                Ok(Some(s))
            }
            Some(_) => Err(EngineError::WrongType),
        }
    }

    fn del(&mut self, key: &[u8]) -> bool {
        if self.map.remove(key).is_some() {
            self.recency.forget(key);
            true
        } else {
            false
        }
    }

    fn type_of(&self, key: &[u8]) -> &'static str {
        if !self.filter.probe(key) {
            return crate::value::TYPE_NONE;
        }
        match self.map.get(key) {
            None => crate::value::TYPE_NONE,
            Some(v) => v.type_name(),
        }
    }

    // ---- get-or-create helper for aggregate writes ----

    fn get_or_create_list(&mut self, key: &[u8]) -> Result<&mut std::collections::VecDeque<Bytes>, EngineError> {
        if !self.map.contains_key(key) {
            self.map.insert(key.to_vec(), Value::List(Default::default()));
            self.filter.add(key);
        }
        self.map.get_mut(key).unwrap().as_list_mut().ok_or(EngineError::WrongType)
    }

    fn get_or_create_set(&mut self, key: &[u8]) -> Result<&mut std::collections::HashSet<Bytes>, EngineError> {
        if !self.map.contains_key(key) {
            self.map.insert(key.to_vec(), Value::Set(Default::default()));
            self.filter.add(key);
        }
        self.map.get_mut(key).unwrap().as_set_mut().ok_or(EngineError::WrongType)
    }

    fn get_or_create_hash(&mut self, key: &[u8]) -> Result<&mut HashMap<Bytes, Bytes>, EngineError> {
        if !self.map.contains_key(key) {
            self.map.insert(key.to_vec(), Value::Hash(Default::default()));
            self.filter.add(key);
        }
        self.map.get_mut(key).unwrap().as_hash_mut().ok_or(EngineError::WrongType)
    }

    // ---- List ----

    fn lpush(&mut self, key: &[u8], val: Bytes) -> Result<i64, EngineError> {
        let list = self.get_or_create_list(key)?;
        list.push_front(val);
        let len = list.len() as i64;
        self.recency.touch(key);
        self.evict_to_capacity();
        Ok(len)
    }

    fn rpush(&mut self, key: &[u8], val: Bytes) -> Result<i64, EngineError> {
        let list = self.get_or_create_list(key)?;
        list.push_back(val);
        let len = list.len() as i64;
        self.recency.touch(key);
        self.evict_to_capacity();
        Ok(len)
    }

    fn lpop(&mut self, key: &[u8]) -> Result<Option<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(None);
        }
        let Some(v) = self.map.get_mut(key) else {
            return Ok(None);
        };
        let list = v.as_list_mut().ok_or(EngineError::WrongType)?;
        let popped = list.pop_front();
        if popped.is_some() {
            self.recency.touch(key);
        }
        self.drop_if_emptied(key);
        Ok(popped)
    }

    fn rpop(&mut self, key: &[u8]) -> Result<Option<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(None);
        }
        let Some(v) = self.map.get_mut(key) else {
            return Ok(None);
        };
        let list = v.as_list_mut().ok_or(EngineError::WrongType)?;
        let popped = list.pop_back();
        if popped.is_some() {
            self.recency.touch(key);
        }
        self.drop_if_emptied(key);
        Ok(popped)
    }

    fn lindex(&self, key: &[u8], idx: i64) -> Result<Option<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(None);
        }
        match self.map.get(key) {
            None => Ok(None),
            Some(v) => {
                let list = v.as_list().ok_or(EngineError::WrongType)?;
                Ok(crate::value::list_index(list, idx).cloned())
            }
        }
    }

    fn llen(&self, key: &[u8]) -> Result<i64, EngineError> {
        if !self.filter.probe(key) {
            return Ok(0);
        }
        match self.map.get(key) {
            None => Ok(0),
            Some(v) => Ok(v.as_list().ok_or(EngineError::WrongType)?.len() as i64),
        }
    }

    fn lrange(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(Vec::new());
        }
        match self.map.get(key) {
            None => Ok(Vec::new()),
            Some(v) => {
                let list = v.as_list().ok_or(EngineError::WrongType)?;
                Ok(crate::value::list_range(list, start, end))
            }
        }
    }

    // ---- Set ----

    fn sadd(&mut self, key: &[u8], member: Bytes) -> Result<bool, EngineError> {
        let set = self.get_or_create_set(key)?;
        let inserted = set.insert(member);
        self.recency.touch(key);
        self.evict_to_capacity();
        Ok(inserted)
    }

    fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool, EngineError> {
        if !self.filter.probe(key) {
            return Ok(false);
        }
        match self.map.get(key) {
            None => Ok(false),
            Some(v) => Ok(v.as_set().ok_or(EngineError::WrongType)?.contains(member)),
        }
    }

    fn srem(&mut self, key: &[u8], member: &[u8]) -> Result<bool, EngineError> {
        if !self.filter.probe(key) {
            return Ok(false);
        }
        let Some(v) = self.map.get_mut(key) else {
            return Ok(false);
        };
        let set = v.as_set_mut().ok_or(EngineError::WrongType)?;
        let removed = set.remove(member);
        if removed {
            self.recency.touch(key);
        }
        self.drop_if_emptied(key);
        Ok(removed)
    }

    fn scard(&self, key: &[u8]) -> Result<i64, EngineError> {
        if !self.filter.probe(key) {
            return Ok(0);
        }
        match self.map.get(key) {
            None => Ok(0),
            Some(v) => Ok(v.as_set().ok_or(EngineError::WrongType)?.len() as i64),
        }
    }

    fn smembers(&self, key: &[u8]) -> Result<Vec<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(Vec::new());
        }
        match self.map.get(key) {
            None => Ok(Vec::new()),
            Some(v) => Ok(v.as_set().ok_or(EngineError::WrongType)?.iter().cloned().collect()),
        }
    }

    // ---- Hash ----

    fn hset(&mut self, key: &[u8], field: Bytes, val: Bytes) -> Result<bool, EngineError> {
        let hash = self.get_or_create_hash(key)?;
        let is_new = !hash.contains_key(&field);
        hash.insert(field, val);
        self.recency.touch(key);
        self.evict_to_capacity();
        Ok(is_new)
    }

    fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(None);
        }
        match self.map.get(key) {
            None => Ok(None),
            Some(v) => Ok(v.as_hash().ok_or(EngineError::WrongType)?.get(field).cloned()),
        }
    }

    fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool, EngineError> {
        if !self.filter.probe(key) {
            return Ok(false);
        }
        match self.map.get(key) {
            None => Ok(false),
            Some(v) => Ok(v.as_hash().ok_or(EngineError::WrongType)?.contains_key(field)),
        }
    }

    fn hdel(&mut self, key: &[u8], field: &[u8]) -> Result<bool, EngineError> {
        if !self.filter.probe(key) {
            return Ok(false);
        }
        let Some(v) = self.map.get_mut(key) else {
            return Ok(false);
        };
        let hash = v.as_hash_mut().ok_or(EngineError::WrongType)?;
        let removed = hash.remove(field).is_some();
        if removed {
            self.recency.touch(key);
        }
        self.drop_if_emptied(key);
        Ok(removed)
    }

    fn hlen(&self, key: &[u8]) -> Result<i64, EngineError> {
        if !self.filter.probe(key) {
            return Ok(0);
        }
        match self.map.get(key) {
            None => Ok(0),
            Some(v) => Ok(v.as_hash().ok_or(EngineError::WrongType)?.len() as i64),
        }
    }

    fn hkeys(&self, key: &[u8]) -> Result<Vec<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(Vec::new());
        }
        match self.map.get(key) {
            None => Ok(Vec::new()),
            Some(v) => Ok(v.as_hash().ok_or(EngineError::WrongType)?.keys().cloned().collect()),
        }
    }

    fn hvals(&self, key: &[u8]) -> Result<Vec<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(Vec::new());
        }
        match self.map.get(key) {
            None => Ok(Vec::new()),
            Some(v) => Ok(v.as_hash().ok_or(EngineError::WrongType)?.values().cloned().collect()),
        }
    }

    fn hgetall(&self, key: &[u8]) -> Result<Vec<Bytes>, EngineError> {
        if !self.filter.probe(key) {
            return Ok(Vec::new());
        }
        match self.map.get(key) {
            None => Ok(Vec::new()),
            Some(v) => {
                let hash = v.as_hash().ok_or(EngineError::WrongType)?;
                let mut out = Vec::with_capacity(hash.len() * 2);
                for (f, val) in hash.iter() {
                    out.push(f.clone());
                    out.push(val.clone());
                }
                Ok(out)
            }
        }
    }
}

/// The engine handle the dispatcher and persistence layer hold: one
/// readers-writer lock over the whole keyspace. No per-key striping.
pub struct Store {
    inner: RwLock<Keyspace>,
}

impl Store {
    pub fn new(capacity: usize, filter_bits: usize) -> Self {
        Store {
            inner: RwLock::new(Keyspace::new(capacity, filter_bits)),
        }
    }

    pub fn set(&self, key: &[u8], val: Bytes) {
        self.inner.write().unwrap().set(key, val);
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>, EngineError> {
        self.inner.write().unwrap().get(key)
    }

    pub fn del(&self, key: &[u8]) -> bool {
        self.inner.write().unwrap().del(key)
    }

    pub fn type_of(&self, key: &[u8]) -> &'static str {
        self.inner.read().unwrap().type_of(key)
    }

    pub fn lpush(&self, key: &[u8], val: Bytes) -> Result<i64, EngineError> {
        self.inner.write().unwrap().lpush(key, val)
    }

    pub fn rpush(&self, key: &[u8], val: Bytes) -> Result<i64, EngineError> {
        self.inner.write().unwrap().rpush(key, val)
    }

    pub fn lpop(&self, key: &[u8]) -> Result<Option<Bytes>, EngineError> {
        self.inner.write().unwrap().lpop(key)
    }

    pub fn rpop(&self, key: &[u8]) -> Result<Option<Bytes>, EngineError> {
        self.inner.write().unwrap().rpop(key)
    }

    pub fn lindex(&self, key: &[u8], idx: i64) -> Result<Option<Bytes>, EngineError> {
        self.inner.read().unwrap().lindex(key, idx)
    }

    pub fn llen(&self, key: &[u8]) -> Result<i64, EngineError> {
        self.inner.read().unwrap().llen(key)
    }

    pub fn lrange(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<Bytes>, EngineError> {
        self.inner.read().unwrap().lrange(key, start, end)
    }

    pub fn sadd(&self, key: &[u8], member: Bytes) -> Result<bool, EngineError> {
        self.inner.write().unwrap().sadd(key, member)
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool, EngineError> {
        self.inner.read().unwrap().sismember(key, member)
    }

    pub fn srem(&self, key: &[u8], member: &[u8]) -> Result<bool, EngineError> {
        self.inner.write().unwrap().srem(key, member)
    }

    pub fn scard(&self, key: &[u8]) -> Result<i64, EngineError> {
        self.inner.read().unwrap().scard(key)
    }

    pub fn smembers(&self, key: &[u8]) -> Result<Vec<Bytes>, EngineError> {
        self.inner.read().unwrap().smembers(key)
    }

    pub fn hset(&self, key: &[u8], field: Bytes, val: Bytes) -> Result<bool, EngineError> {
        self.inner.write().unwrap().hset(key, field, val)
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>, EngineError> {
        self.inner.read().unwrap().hget(key, field)
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool, EngineError> {
        self.inner.read().unwrap().hexists(key, field)
    }

    pub fn hdel(&self, key: &[u8], field: &[u8]) -> Result<bool, EngineError> {
        self.inner.write().unwrap().hdel(key, field)
    }

    pub fn hlen(&self, key: &[u8]) -> Result<i64, EngineError> {
        self.inner.read().unwrap().hlen(key)
    }

    pub fn hkeys(&self, key: &[u8]) -> Result<Vec<Bytes>, EngineError> {
        self.inner.read().unwrap().hkeys(key)
    }

    pub fn hvals(&self, key: &[u8]) -> Result<Vec<Bytes>, EngineError> {
        self.inner.read().unwrap().hvals(key)
    }

    pub fn hgetall(&self, key: &[u8]) -> Result<Vec<Bytes>, EngineError> {
        self.inner.read().unwrap().hgetall(key)
    }

    pub fn live_key_count(&self) -> usize {
        self.inner.read().unwrap().recency.len()
    }

    /// Probe soundness check used by tests: every mapped key must probe true.
    pub fn filter_sound(&self) -> bool {
        let ks = self.inner.read().unwrap();
        ks.map.keys().all(|k| ks.filter.probe(k.as_slice()))
    }

    /// Used only by `persist`: a point-in-time snapshot of every live key and
    /// its bound value, for writing the shutdown file.
    pub fn snapshot(&self) -> Vec<(Bytes, Value)> {
        let ks = self.inner.read().unwrap();
        ks.map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Used only by `persist`: install a value loaded from disk, touching
    /// recency in file order. Bypasses get-or-create/type checks since the
    /// file is trusted to hold one binding per key.
    pub fn load_entry(&self, key: Bytes, value: Value) {
        let mut ks = self.inner.write().unwrap();
        ks.filter.add(&key);
        ks.recency.touch(&key);
        ks.map.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        s.as_bytes().to_vec()
    }

    #[test]
    fn set_then_get_round_trips() {
        let s = Store::new(1000, 10_000);
        s.set(b"greet", b("hello"));
        assert_eq!(s.get(b"greet").unwrap(), Some(b("hello")));
    }

    #[test]
    fn del_removes_key_and_frees_type() {
        let s = Store::new(1000, 10_000);
        s.set(b"greet", b("hello"));
        assert!(s.del(b"greet"));
        assert_eq!(s.get(b"greet").unwrap(), None);
        assert_eq!(s.type_of(b"greet"), crate::value::TYPE_NONE);
    }

    #[test]
    fn wrong_type_on_mismatched_variant() {
        let s = Store::new(1000, 10_000);
        s.set(b"a", b("1"));
        assert_eq!(s.lpush(b"a", b("2")), Err(EngineError::WrongType));
    }

    #[test]
    fn list_push_pop_stack_and_queue_semantics() {
        let s = Store::new(1000, 10_000);
        s.lpush(b"l", b("v")).unwrap();
        assert_eq!(s.lpop(b"l").unwrap(), Some(b("v")));

        s.rpush(b"l2", b("v2")).unwrap();
        assert_eq!(s.rpop(b"l2").unwrap(), Some(b("v2")));
    }

    #[test]
    fn lrange_full_returns_elements_in_order() {
        let s = Store::new(1000, 10_000);
        s.rpush(b"l", b("x")).unwrap();
        s.rpush(b"l", b("y")).unwrap();
        s.rpush(b"l", b("z")).unwrap();
        assert_eq!(s.lrange(b"l", 0, -1).unwrap(), vec![b("x"), b("y"), b("z")]);
    }

    #[test]
    fn set_add_dedup_and_membership() {
        let s = Store::new(1000, 10_000);
        assert!(s.sadd(b"s", b("a")).unwrap());
        assert!(!s.sadd(b"s", b("a")).unwrap());
        assert!(s.sismember(b"s", b"a").unwrap());
    }

    #[test]
    fn srem_of_last_element_removes_key() {
        let s = Store::new(1000, 10_000);
        s.sadd(b"s", b("a")).unwrap();
        assert!(s.srem(b"s", b"a").unwrap());
        assert_eq!(s.scard(b"s").unwrap(), 0);
        assert_eq!(s.type_of(b"s"), crate::value::TYPE_NONE);
    }

    #[test]
    fn hset_idempotence_does_not_change_hlen() {
        let s = Store::new(1000, 10_000);
        assert!(s.hset(b"u", b("name"), b("alice")).unwrap());
        assert!(!s.hset(b"u", b("name"), b("alice")).unwrap());
        assert_eq!(s.hlen(b"u").unwrap(), 1);
    }

    #[test]
    fn eviction_bounds_live_key_count() {
        let s = Store::new(2, 10_000);
        s.set(b"k1", b("v1"));
        s.set(b"k2", b("v2"));
        s.set(b"k3", b("v3"));
        assert!(s.live_key_count() <= 2);
        assert_eq!(s.get(b"k1").unwrap(), None);
        assert_eq!(s.get(b"k2").unwrap(), Some(b("v2")));
        assert_eq!(s.get(b"k3").unwrap(), Some(b("v3")));
    }

    #[test]
    fn recency_n_plus_one_keys_evicts_the_first() {
        let s = Store::new(3, 10_000);
        for i in 0..4 {
            s.set(format!("k{i}").as_bytes(), b("v"));
        }
        assert_eq!(s.get(b"k0").unwrap(), None);
        assert!(s.get(b"k3").unwrap().is_some());
    }

    #[test]
    fn filter_soundness_holds_for_every_live_key() {
        let s = Store::new(1000, 10_000);
        s.set(b"a", b("1"));
        s.rpush(b"b", b("2")).unwrap();
        s.sadd(b"c", b("3")).unwrap();
        s.hset(b"d", b("f"), b("4")).unwrap();
        assert!(s.filter_sound());
    }

    #[test]
    fn empty_aggregate_is_not_observable_across_operations() {
        let s = Store::new(1000, 10_000);
        s.rpush(b"l", b("only")).unwrap();
        s.lpop(b"l").unwrap();
        assert_eq!(s.llen(b"l").unwrap(), 0);
        assert_eq!(s.type_of(b"l"), crate::value::TYPE_NONE);
    }
}
