//! Persistence collaborator.
//!
//! The runtime treats storage purely as a key-value store keyed by entity
//! id. Managers receive an explicit repository instance; there is no
//! process-wide registry, so independent manager sets can coexist in one
//! process.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Anything a repository can hold.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> String;

    /// Named attribute used by [`Repository::search_all`]. Returns `None`
    /// for unknown attribute names.
    fn attribute(&self, name: &str) -> Option<String>;
}

pub trait Repository<E: Entity>: Send + Sync {
    fn save(&self, entity: E);
    fn load(&self, id: &str) -> Option<E>;
    fn load_all(&self) -> Vec<E>;
    fn search_all(&self, attribute: &str, value: &str) -> Vec<E>;
    fn delete(&self, id: &str) -> bool;
    fn delete_all(&self);
}

/// In-memory repository backing the default managers.
pub struct InMemoryRepository<E: Entity> {
    entities: RwLock<HashMap<String, E>>,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entities: RwLock::new(HashMap::new()),
        })
    }
}

impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    fn save(&self, entity: E) {
        self.entities.write().insert(entity.id(), entity);
    }

    fn load(&self, id: &str) -> Option<E> {
        self.entities.read().get(id).cloned()
    }

    fn load_all(&self) -> Vec<E> {
        self.entities.read().values().cloned().collect()
    }

    fn search_all(&self, attribute: &str, value: &str) -> Vec<E> {
        self.entities
            .read()
            .values()
            .filter(|entity| entity.attribute(attribute).as_deref() == Some(value))
            .cloned()
            .collect()
    }

    fn delete(&self, id: &str) -> bool {
        self.entities.write().remove(id).is_some()
    }

    fn delete_all(&self) {
        self.entities.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Dummy {
        id: String,
        kind: String,
    }

    impl Entity for Dummy {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn attribute(&self, name: &str) -> Option<String> {
            match name {
                "kind" => Some(self.kind.clone()),
                _ => None,
            }
        }
    }

    #[test]
    fn saves_loads_and_searches() {
        let repo = InMemoryRepository::new();
        repo.save(Dummy {
            id: "a".into(),
            kind: "x".into(),
        });
        repo.save(Dummy {
            id: "b".into(),
            kind: "y".into(),
        });

        assert!(repo.load("a").is_some());
        assert!(repo.load("missing").is_none());
        assert_eq!(repo.load_all().len(), 2);
        assert_eq!(repo.search_all("kind", "y").len(), 1);
        assert!(repo.delete("a"));
        assert!(!repo.delete("a"));
        repo.delete_all();
        assert!(repo.load_all().is_empty());
    }
}
