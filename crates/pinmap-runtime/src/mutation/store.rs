#![forbid(unsafe_code)]

//! Observable entity collections.
//!
//! An [`EntityStore`] holds its entities as one `Arc<Vec<E>>` behind an
//! [`Observable`]. Every write builds a new vector and swaps it in whole, so
//! a renderer holding a [`snapshot`](EntityStore::snapshot) never sees a
//! half-applied change, and subscribers fire once per write.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use pinmap_core::{Annotation, AnnotationId, Floor, FloorId};

use crate::reactive::{Observable, Subscription};

/// An entity the pipeline can hold optimistically.
pub trait Record: Clone + PartialEq + Debug + 'static {
    type Id: Clone + Eq + Hash + Debug;

    fn id(&self) -> &Self::Id;

    fn is_pending(&self) -> bool;

    fn set_pending(&mut self, pending: bool);
}

impl Record for Annotation {
    type Id = AnnotationId;

    fn id(&self) -> &AnnotationId {
        &self.id
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }
}

impl Record for Floor {
    type Id = FloorId;

    fn id(&self) -> &FloorId {
        &self.id
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }
}

/// Shared, observable, whole-value-replaced collection.
pub struct EntityStore<E: Record> {
    items: Observable<Arc<Vec<E>>>,
}

impl<E: Record> Clone for EntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<E: Record> Debug for EntityStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("items", &self.items)
            .finish()
    }
}

impl<E: Record> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Record> EntityStore<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Observable::new(Arc::new(Vec::new())),
        }
    }

    /// The current collection. Cheap; shares the vector.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<E>> {
        self.items.get()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.with(|items| items.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.items.version()
    }

    #[must_use]
    pub fn get(&self, id: &E::Id) -> Option<E> {
        self.items
            .with(|items| items.iter().find(|e| e.id() == id).cloned())
    }

    #[must_use]
    pub fn index_of(&self, id: &E::Id) -> Option<usize> {
        self.items.with(|items| items.iter().position(|e| e.id() == id))
    }

    #[must_use]
    pub fn contains(&self, id: &E::Id) -> bool {
        self.index_of(id).is_some()
    }

    /// Subscribe to collection changes.
    pub fn subscribe(&self, callback: impl Fn(&Arc<Vec<E>>) + 'static) -> Subscription {
        self.items.subscribe(callback)
    }

    fn write(&self, f: impl FnOnce(&mut Vec<E>)) {
        let mut next = self.items.with(|items| Vec::clone(items));
        f(&mut next);
        self.items.set(Arc::new(next));
    }

    /// Append an entity.
    pub fn push(&self, entity: E) {
        self.write(|items| items.push(entity));
    }

    /// Replace the entity with `id` in place. Returns the previous value.
    pub fn replace(&self, id: &E::Id, entity: E) -> Option<E> {
        let index = self.index_of(id)?;
        let mut previous = None;
        self.write(|items| {
            previous = Some(std::mem::replace(&mut items[index], entity));
        });
        previous
    }

    /// Swap the optimistic entity `temp` for its confirmed form, clearing
    /// `pending`. Any other copy of the confirmed id (say, from a list reply
    /// that overtook the create) is dropped, so ids stay unique.
    pub fn install(&self, temp: &E::Id, mut confirmed: E) {
        confirmed.set_pending(false);
        self.write(|items| {
            let stored = confirmed.id().clone();
            items.retain(|e| e.id() != &stored || e.id() == temp);
            match items.iter().position(|e| e.id() == temp) {
                Some(at) => items[at] = confirmed,
                None => items.push(confirmed),
            }
        });
    }

    /// Remove the entity with `id`, returning its index and value.
    pub fn remove(&self, id: &E::Id) -> Option<(usize, E)> {
        let index = self.index_of(id)?;
        let mut removed = None;
        self.write(|items| removed = Some((index, items.remove(index))));
        removed
    }

    /// Ids of the entities after `id`, in order. Pair with
    /// [`reinsert`](Self::reinsert) to undo a removal even when other
    /// removals or insertions happened in between.
    #[must_use]
    pub fn successors_of(&self, id: &E::Id) -> Vec<E::Id> {
        self.items.with(|items| {
            items
                .iter()
                .skip_while(|e| e.id() != id)
                .skip(1)
                .map(|e| e.id().clone())
                .collect()
        })
    }

    /// Insert `entity` before the first present entity listed in
    /// `successors`, or at the end when none is present. Returns false and
    /// leaves the collection alone when the id is already present.
    pub fn reinsert(&self, entity: E, successors: &[E::Id]) -> bool {
        if self.contains(entity.id()) {
            return false;
        }
        self.write(|items| {
            let index = items
                .iter()
                .position(|e| successors.contains(e.id()))
                .unwrap_or(items.len());
            items.insert(index, entity);
        });
        true
    }

    /// Remove every entity matching `pred`, returning them in order.
    pub fn remove_where(&self, pred: impl Fn(&E) -> bool) -> Vec<E> {
        let mut removed = Vec::new();
        self.write(|items| {
            let (gone, kept): (Vec<E>, Vec<E>) = items.drain(..).partition(|e| pred(e));
            removed = gone;
            *items = kept;
        });
        removed
    }

    /// Replace the whole collection.
    pub fn replace_all(&self, entities: Vec<E>) {
        self.items.set(Arc::new(entities));
    }

    /// Replace the entities selected by `scope` with `fresh`.
    ///
    /// Pending entities and those for which `keep_local` holds survive, and
    /// win over a fresh entity with the same id. Fresh entities for which
    /// `keep_local` holds are skipped even when no local copy exists (a
    /// delete in flight). Fresh entities arrive confirmed.
    pub fn reconcile_scope(
        &self,
        scope: impl Fn(&E) -> bool,
        keep_local: impl Fn(&E) -> bool,
        fresh: Vec<E>,
    ) {
        self.write(|items| {
            items.retain(|e| !scope(e) || e.is_pending() || keep_local(e));
            for mut entity in fresh {
                if keep_local(&entity) || items.iter().any(|e| e.id() == entity.id()) {
                    continue;
                }
                entity.set_pending(false);
                items.push(entity);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinmap_core::Position;
    use std::cell::Cell;
    use std::rc::Rc;

    fn pin(id: &str, floor: &str) -> Annotation {
        Annotation {
            id: AnnotationId::stored(id),
            floor_id: FloorId::stored(floor),
            title: id.to_uppercase(),
            description: String::new(),
            position: Position::new(50.0, 50.0),
            image: None,
            author: None,
            pending: false,
        }
    }

    fn ids(store: &EntityStore<Annotation>) -> Vec<String> {
        store.snapshot().iter().map(|a| a.id.to_string()).collect()
    }

    #[test]
    fn snapshots_are_immutable() {
        let store = EntityStore::new();
        store.push(pin("a", "f"));
        let before = store.snapshot();
        store.push(pin("b", "f"));
        assert_eq!(before.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn one_notification_per_write() {
        let store = EntityStore::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = store.subscribe(move |_| c.set(c.get() + 1));
        store.replace_all(vec![pin("a", "f"), pin("b", "f"), pin("c", "f")]);
        store.remove_where(|a| a.id != AnnotationId::stored("b"));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn remove_where_returns_matches_in_order() {
        let store = EntityStore::new();
        store.replace_all(vec![pin("a", "f"), pin("b", "g"), pin("c", "f"), pin("d", "g")]);
        let removed = store.remove_where(|a| a.floor_id == FloorId::stored("g"));
        assert_eq!(ids(&store), vec!["a", "c"]);
        let removed: Vec<String> = removed.iter().map(|a| a.id.to_string()).collect();
        assert_eq!(removed, vec!["b", "d"]);
    }

    #[test]
    fn remove_returns_index() {
        let store = EntityStore::new();
        store.replace_all(vec![pin("a", "f"), pin("b", "f")]);
        let (index, removed) = store.remove(&AnnotationId::stored("b")).unwrap();
        assert_eq!(index, 1);
        assert_eq!(removed.title, "B");
        assert!(store.remove(&AnnotationId::stored("b")).is_none());
    }

    #[test]
    fn reinsert_never_duplicates() {
        let store = EntityStore::new();
        store.replace_all(vec![pin("a", "f"), pin("b", "f")]);
        assert!(!store.reinsert(pin("a", "f"), &[]));
        assert_eq!(ids(&store), vec!["a", "b"]);
    }

    #[test]
    fn install_replaces_temp_and_drops_earlier_copy() {
        let store = EntityStore::new();
        let mut temp = pin("t", "f");
        temp.id = AnnotationId::Temp(4);
        temp.pending = true;
        store.replace_all(vec![pin("a", "f"), temp, pin("n", "f")]);

        let mut confirmed = pin("n", "f");
        confirmed.pending = true;
        store.install(&AnnotationId::Temp(4), confirmed);
        assert_eq!(ids(&store), vec!["a", "n"]);
        assert!(!store.snapshot()[1].pending);
    }

    #[test]
    fn install_without_temp_appends() {
        let store = EntityStore::new();
        store.replace_all(vec![pin("n", "f")]);
        store.install(&AnnotationId::Temp(9), pin("n", "f"));
        assert_eq!(ids(&store), vec!["n"]);
    }

    #[test]
    fn reinsert_survives_interleaved_removals() {
        let store = EntityStore::new();
        store.replace_all(vec![pin("a", "f"), pin("b", "f"), pin("c", "f")]);
        let after_a = store.successors_of(&AnnotationId::stored("a"));
        let (_, a) = store.remove(&AnnotationId::stored("a")).unwrap();
        let after_b = store.successors_of(&AnnotationId::stored("b"));
        let (_, b) = store.remove(&AnnotationId::stored("b")).unwrap();

        store.reinsert(a, &after_a);
        store.reinsert(b, &after_b);
        assert_eq!(ids(&store), vec!["a", "b", "c"]);
        assert!(store.successors_of(&AnnotationId::stored("c")).is_empty());
    }

    #[test]
    fn replace_keeps_position() {
        let store = EntityStore::new();
        store.replace_all(vec![pin("a", "f"), pin("b", "f")]);
        let mut updated = pin("a", "f");
        updated.title = "Renamed".into();
        let previous = store.replace(&AnnotationId::stored("a"), updated).unwrap();
        assert_eq!(previous.title, "A");
        assert_eq!(store.snapshot()[0].title, "Renamed");
    }

    #[test]
    fn reconcile_scope_keeps_local_entries() {
        let store = EntityStore::new();
        let mut temp = pin("t", "f");
        temp.id = AnnotationId::Temp(1);
        temp.pending = true;
        store.replace_all(vec![pin("a", "f"), temp, pin("x", "g")]);

        let mut fresh_b = pin("b", "f");
        fresh_b.pending = true;
        let fresh = vec![pin("a", "f"), fresh_b, pin("gone", "f")];
        store.reconcile_scope(
            |a| a.floor_id == FloorId::stored("f"),
            |a| a.id == AnnotationId::stored("gone"),
            fresh,
        );
        assert_eq!(ids(&store), vec!["pin-temp-1", "x", "a", "b"]);
        assert!(!store.get(&AnnotationId::stored("b")).unwrap().pending);
    }
}
