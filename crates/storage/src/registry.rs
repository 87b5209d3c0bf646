use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::entry::{Retired, Slot};

/// Mapa chave → slot. O lock de shard do DashMap só é mantido durante
/// criação/remoção; a mutação do valor acontece sob o lock do próprio slot.
#[derive(Debug, Default)]
pub(crate) struct KeyRegistry {
    slots: DashMap<String, Arc<Slot>>,
}

impl KeyRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<Arc<Slot>> {
        self.slots.get(key).map(|slot| Arc::clone(slot.value()))
    }

    /// Retorna o slot existente ou instala uma fila vazia. Duas chamadas
    /// concorrentes para a mesma chave ausente observam o mesmo slot.
    pub(crate) fn get_or_create_queue(&self, key: &str) -> Arc<Slot> {
        if let Some(slot) = self.lookup(key) {
            return slot;
        }
        let slot = self
            .slots
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Slot::empty_queue()));
        Arc::clone(slot.value())
    }

    /// Instala `slot` sobrescrevendo qualquer slot anterior, de qualquer tipo.
    pub(crate) fn replace(&self, key: String, slot: Slot) {
        match self.slots.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.get().retire(Retired::Replaced);
                occupied.insert(Arc::new(slot));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(slot));
            }
        }
    }

    /// Remove a chave. Os waiters do slot removido acordam com `Deleted`.
    pub(crate) fn remove(&self, key: &str) -> bool {
        if !self.slots.contains_key(key) {
            return false;
        }
        match self.slots.entry(key.to_owned()) {
            Entry::Occupied(occupied) => {
                occupied.get().retire(Retired::Deleted);
                occupied.remove();
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    pub(crate) fn exists(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
