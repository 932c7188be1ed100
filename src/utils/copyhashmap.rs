use {
    ahash::AHashMap,
    std::{
        borrow::Borrow,
        cell::{RefCell, RefMut},
        fmt::{Debug, Formatter},
        hash::Hash,
        mem,
    },
};

pub struct CopyHashMap<K, V> {
    map: RefCell<AHashMap<K, V>>,
}

impl<K: Debug, V: Debug> Debug for CopyHashMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.map.fmt(f)
    }
}

impl<K, V> Default for CopyHashMap<K, V> {
    fn default() -> Self {
        Self {
            map: Default::default(),
        }
    }
}

impl<K: Eq + Hash, V> CopyHashMap<K, V> {
    pub fn set(&self, k: K, v: V) -> Option<V> {
        self.map.borrow_mut().insert(k, v)
    }

    pub fn get<Q: ?Sized>(&self, k: &Q) -> Option<V>
    where
        V: Clone,
        Q: Hash + Eq,
        K: Borrow<Q>,
    {
        self.map.borrow_mut().get(k).cloned()
    }

    pub fn remove<Q: ?Sized>(&self, k: &Q) -> Option<V>
    where
        Q: Hash + Eq,
        K: Borrow<Q>,
    {
        self.map.borrow_mut().remove(k)
    }

    pub fn contains<Q: ?Sized>(&self, k: &Q) -> bool
    where
        Q: Hash + Eq,
        K: Borrow<Q>,
    {
        self.map.borrow_mut().contains_key(k)
    }

    pub fn lock(&self) -> RefMut<'_, AHashMap<K, V>> {
        self.map.borrow_mut()
    }

    pub fn clear(&self) {
        mem::take(&mut *self.map.borrow_mut());
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow_mut().is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.borrow_mut().len()
    }
}
