//! # Instance Keeper
//!
//! Keyed store for retained instances: objects that outlive a component being
//! recreated (the host tearing the tree down and building it again from saved
//! state) but not the component being permanently removed.
//!
//! Every entry is released exactly once, either by [`InstanceKeeper::release`]
//! or when the whole keeper is destroyed. Releasing twice is a no-op.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use super::KeeperError;

/// Something that can live in an [`InstanceKeeper`].
pub trait Instance: Any {
    /// Called once, when the entry is released.
    fn on_destroy(&self) {}
}

struct Entry {
    key: String,
    any: Rc<dyn Any>,
    instance: Rc<dyn Instance>,
}

#[derive(Default)]
struct InstanceKeeperInner {
    entries: Vec<Entry>,
    destroyed: bool,
}

#[derive(Clone, Default)]
pub struct InstanceKeeper {
    inner: Rc<RefCell<InstanceKeeperInner>>,
}

impl InstanceKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the instance stored under `key`, or `None` if absent or of a
    /// different type.
    pub fn get<T: Instance>(&self, key: &str) -> Option<Rc<T>> {
        let any = self
            .inner
            .borrow()
            .entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| Rc::clone(&e.any))?;
        any.downcast::<T>().ok()
    }

    pub fn get_or_create<T, F>(&self, key: &str, factory: F) -> Result<Rc<T>, KeeperError>
    where
        T: Instance,
        F: FnOnce() -> T,
    {
        let existing = self
            .inner
            .borrow()
            .entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| Rc::clone(&e.any));

        match existing {
            Some(any) => any
                .downcast::<T>()
                .map_err(|_| KeeperError::TypeMismatch(key.to_string())),
            None => self.put(key, factory()),
        }
    }

    pub fn put<T: Instance>(&self, key: &str, instance: T) -> Result<Rc<T>, KeeperError> {
        let mut inner = self.inner.borrow_mut();
        if inner.destroyed {
            return Err(KeeperError::Destroyed);
        }
        if inner.entries.iter().any(|e| e.key == key) {
            return Err(KeeperError::AlreadyRegistered(key.to_string()));
        }
        let instance = Rc::new(instance);
        inner.entries.push(Entry {
            key: key.to_string(),
            any: Rc::clone(&instance) as Rc<dyn Any>,
            instance: Rc::clone(&instance) as Rc<dyn Instance>,
        });
        Ok(instance)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().entries.iter().any(|e| e.key == key)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the entry and calls its `on_destroy`. Returns whether an entry
    /// was present.
    pub fn release(&self, key: &str) -> bool {
        let entry = {
            let mut inner = self.inner.borrow_mut();
            let position = inner.entries.iter().position(|e| e.key == key);
            position.map(|p| inner.entries.remove(p))
        };
        match entry {
            Some(entry) => {
                debug!("Releasing retained instance '{}'", entry.key);
                entry.instance.on_destroy();
                true
            }
            None => false,
        }
    }

    /// Releases every entry, most recently added first. Later `put` calls
    /// fail with [`KeeperError::Destroyed`].
    pub fn destroy(&self) {
        let entries = {
            let mut inner = self.inner.borrow_mut();
            inner.destroyed = true;
            std::mem::take(&mut inner.entries)
        };
        for entry in entries.into_iter().rev() {
            debug!("Releasing retained instance '{}'", entry.key);
            entry.instance.on_destroy();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().destroyed
    }
}

/// Nested keepers are themselves retained instances, so releasing a parent
/// slot tears the whole subtree down.
impl Instance for InstanceKeeper {
    fn on_destroy(&self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        destroyed: Rc<Cell<u32>>,
    }

    impl Instance for Counter {
        fn on_destroy(&self) {
            self.destroyed.set(self.destroyed.get() + 1);
        }
    }

    struct Other;
    impl Instance for Other {}

    fn counter(destroyed: &Rc<Cell<u32>>) -> Counter {
        Counter {
            destroyed: Rc::clone(destroyed),
        }
    }

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let keeper = InstanceKeeper::new();
        let destroyed = Rc::new(Cell::new(0));

        let first = keeper.get_or_create("c", || counter(&destroyed)).unwrap();
        let second = keeper.get_or_create("c", || counter(&destroyed)).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(keeper.len(), 1);
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let keeper = InstanceKeeper::new();
        keeper.put("c", Other).unwrap();

        let destroyed = Rc::new(Cell::new(0));
        let result = keeper.get_or_create("c", || counter(&destroyed));
        assert!(matches!(result, Err(KeeperError::TypeMismatch(_))));
        assert!(keeper.get::<Counter>("c").is_none());
    }

    #[test]
    fn test_release_destroys_exactly_once() {
        let keeper = InstanceKeeper::new();
        let destroyed = Rc::new(Cell::new(0));
        keeper.put("c", counter(&destroyed)).unwrap();

        assert!(keeper.release("c"));
        assert!(!keeper.release("c"));
        keeper.destroy();

        assert_eq!(destroyed.get(), 1);
    }

    #[test]
    fn test_destroy_releases_nested_keepers() {
        let parent = InstanceKeeper::new();
        let destroyed = Rc::new(Cell::new(0));
        let child = parent.get_or_create("child", InstanceKeeper::new).unwrap();
        child.put("c", counter(&destroyed)).unwrap();

        parent.destroy();

        assert_eq!(destroyed.get(), 1);
        assert!(child.is_destroyed());
        assert!(matches!(parent.put("late", Other), Err(KeeperError::Destroyed)));
    }
}
