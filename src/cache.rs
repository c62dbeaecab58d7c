use crate::model::{ClassGroup, Grade, Student};
use crate::store::{DateOrder, GradeFilter, StudentFilter};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Classes,
    Students,
    Grades,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Classes,
    Students(StudentFilter),
    Grades(GradeFilter, DateOrder),
}

impl QueryKey {
    pub fn collection(&self) -> Collection {
        match self {
            QueryKey::Classes => Collection::Classes,
            QueryKey::Students(_) => Collection::Students,
            QueryKey::Grades(_, _) => Collection::Grades,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedList {
    Classes(Vec<ClassGroup>),
    Students(Vec<Student>),
    Grades(Vec<Grade>),
}

/// Record types whose list results can live in the cache.
pub trait Cacheable: Clone + Sized {
    fn wrap(items: Vec<Self>) -> CachedList;
    fn unwrap(list: &CachedList) -> Option<&Vec<Self>>;
}

impl Cacheable for ClassGroup {
    fn wrap(items: Vec<Self>) -> CachedList {
        CachedList::Classes(items)
    }
    fn unwrap(list: &CachedList) -> Option<&Vec<Self>> {
        match list {
            CachedList::Classes(v) => Some(v),
            _ => None,
        }
    }
}

impl Cacheable for Student {
    fn wrap(items: Vec<Self>) -> CachedList {
        CachedList::Students(items)
    }
    fn unwrap(list: &CachedList) -> Option<&Vec<Self>> {
        match list {
            CachedList::Students(v) => Some(v),
            _ => None,
        }
    }
}

impl Cacheable for Grade {
    fn wrap(items: Vec<Self>) -> CachedList {
        CachedList::Grades(items)
    }
    fn unwrap(list: &CachedList) -> Option<&Vec<Self>> {
        match list {
            CachedList::Grades(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CachedList>,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Cacheable>(&mut self, key: &QueryKey) -> Option<Vec<T>> {
        match self.entries.get(key).and_then(T::unwrap) {
            Some(v) => {
                self.hits += 1;
                Some(v.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put<T: Cacheable>(&mut self, key: QueryKey, items: Vec<T>) {
        self.entries.insert(key, T::wrap(items));
    }

    /// Drops every cached list of the collection; returns how many were dropped.
    pub fn invalidate(&mut self, collection: Collection) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| k.collection() != collection);
        let dropped = before - self.entries.len();
        self.invalidations += 1;
        dropped
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            invalidations: self.invalidations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, class_id: Option<&str>) -> Student {
        Student {
            id: id.into(),
            name: id.into(),
            enrollment_code: None,
            class_id: class_id.map(str::to_string),
            created_at: "2026-01-01".into(),
        }
    }

    #[test]
    fn hit_after_put_and_miss_before() {
        let mut cache = QueryCache::new();
        let key = QueryKey::Students(StudentFilter::InClass("c1".into()));
        assert!(cache.get::<Student>(&key).is_none());
        cache.put(key.clone(), vec![student("s1", Some("c1"))]);
        let got = cache.get::<Student>(&key).expect("hit");
        assert_eq!(got.len(), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn invalidate_drops_every_filter_of_one_collection_only() {
        let mut cache = QueryCache::new();
        cache.put(
            QueryKey::Students(StudentFilter::InClass("c1".into())),
            vec![student("s1", Some("c1"))],
        );
        cache.put(
            QueryKey::Students(StudentFilter::Unassigned),
            vec![student("s2", None)],
        );
        cache.put::<ClassGroup>(QueryKey::Classes, Vec::new());

        assert_eq!(cache.invalidate(Collection::Students), 2);
        assert!(cache
            .get::<Student>(&QueryKey::Students(StudentFilter::Unassigned))
            .is_none());
        assert!(cache.get::<ClassGroup>(&QueryKey::Classes).is_some());
    }

    #[test]
    fn type_mismatch_is_a_miss() {
        let mut cache = QueryCache::new();
        cache.put::<ClassGroup>(QueryKey::Classes, Vec::new());
        assert!(cache.get::<Grade>(&QueryKey::Classes).is_none());
    }
}
