//! Process-wide, lazily-initialized instances keyed by type.
//!
//! Some lookup tables (the block/atom [`Vocab`](crate::core::vocab::Vocab) for example)
//! are expensive enough to build and immutable enough that the whole process should
//! share a single copy. This module keeps at most one instance per type.
//!
//! ## Semantics
//!
//! - [`instance_with`] returns the registered instance of `T`, constructing it with the
//!   supplied closure on first use. Later calls ignore their closure.
//! - [`instance`] is the same with `T::default()` as the constructor.
//! - [`get`] only looks up; it never constructs.
//! - Instances live for the rest of the process and are never replaced or dropped.
//!
//! ## Thread safety
//!
//! Lookups and insertions go through one `Mutex`. The constructor runs *outside* the
//! lock, so a constructor may itself request other registered types. When two threads
//! race to initialize the same type, both may run their constructor, but exactly one
//! value is registered and every caller receives that same value; the losing value is
//! dropped. Constructors should therefore be free of side effects.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

type Slot = &'static (dyn Any + Send + Sync);

static REGISTRY: OnceLock<Mutex<HashMap<TypeId, Slot>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<TypeId, Slot>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lookup(map: &HashMap<TypeId, Slot>, id: TypeId) -> Option<Slot> {
    map.get(&id).copied()
}

/// Returns the registered instance of `T`, if one has been created.
pub fn get<T: Any + Send + Sync>() -> Option<&'static T> {
    let map = registry().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    lookup(&map, TypeId::of::<T>()).and_then(|slot| slot.downcast_ref::<T>())
}

/// Returns the registered instance of `T`, creating it with `init` on first use.
pub fn instance_with<T, F>(init: F) -> &'static T
where
    T: Any + Send + Sync,
    F: FnOnce() -> T,
{
    if let Some(existing) = get::<T>() {
        return existing;
    }

    let candidate = init();

    let mut map = registry().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let slot = match lookup(&map, TypeId::of::<T>()) {
        Some(slot) => slot,
        None => {
            let leaked: Slot = Box::leak(Box::new(candidate));
            map.insert(TypeId::of::<T>(), leaked);
            leaked
        }
    };
    drop(map);

    match slot.downcast_ref::<T>() {
        Some(value) => value,
        None => unreachable!("registry slots are keyed by their own TypeId"),
    }
}

/// Returns the registered instance of `T`, creating it with `T::default()` on first use.
pub fn instance<T: Any + Send + Sync + Default>() -> &'static T {
    instance_with(T::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Debug, Default)]
    struct Counter {
        value: AtomicUsize,
    }

    #[derive(Debug)]
    struct Named(&'static str);

    #[test]
    fn same_type_yields_the_same_instance() {
        let a = instance::<Counter>();
        let b = instance::<Counter>();
        assert!(std::ptr::eq(a, b));

        a.value.fetch_add(1, Ordering::SeqCst);
        assert!(b.value.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn first_initializer_wins() {
        let first = instance_with(|| Named("first"));
        let second = instance_with(|| Named("second"));
        assert_eq!(first.0, "first");
        assert_eq!(second.0, "first");
    }

    #[test]
    fn get_does_not_construct() {
        #[derive(Debug)]
        struct NeverBuilt;
        assert!(get::<NeverBuilt>().is_none());
    }

    #[test]
    fn concurrent_initialization_registers_one_value() {
        #[derive(Debug)]
        struct Racy(usize);

        let handles: Vec<_> = (0..8)
            .map(|i| thread::spawn(move || instance_with(|| Racy(i)) as *const Racy as usize))
            .collect();
        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    }
}
