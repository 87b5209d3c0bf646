use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::debug;

use filadb_common::StorageError;

use crate::entry::{Slot, Value};
use crate::registry::KeyRegistry;

/// Estado compartilhado entre todas as conexões.
pub(crate) struct SharedState {
    pub(crate) registry: KeyRegistry,
    /// Vira `true` no shutdown; todo BQPOP suspenso termina com `Cancelled`.
    pub(crate) shutdown: watch::Sender<bool>,
}

/// Handle para o banco de dados in-memory.
#[derive(Clone)]
pub struct Db {
    pub(crate) shared: Arc<SharedState>,
}

impl Db {
    pub fn new() -> Self {
        Db {
            shared: Arc::new(SharedState {
                registry: KeyRegistry::new(),
                shutdown: watch::channel(false).0,
            }),
        }
    }

    // --- Scalar ---

    pub fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let (_, value) = self
            .with_live_slot(key, |value| match value {
                Value::Scalar(data) => Ok(data.clone()),
                Value::Queue(_) => Err(StorageError::WrongType),
            })
            .ok_or(StorageError::KeyNotFound)?;
        value
    }

    /// Instala um escalar, substituindo o slot anterior qualquer que seja o tipo.
    /// Itens de uma fila substituída são descartados e seus waiters abandonados.
    pub fn set(&self, key: String, value: Bytes) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidArgument("chave vazia".into()));
        }
        if value.is_empty() {
            return Err(StorageError::InvalidArgument("valor vazio".into()));
        }
        self.shared
            .registry
            .replace(key, Slot::new(Value::Scalar(value)));
        Ok(())
    }

    pub fn delete(&self, key: &str) -> bool {
        let removed = self.shared.registry.remove(key);
        if removed {
            debug!("chave removida: {key}");
        }
        removed
    }

    pub fn exists(&self, key: &str) -> bool {
        self.shared.registry.exists(key)
    }

    // --- Queue ---

    /// Anexa `values` ao fim da fila na ordem dada, criando a fila se preciso.
    /// Retorna o tamanho da fila após o push.
    pub fn qpush(&self, key: &str, values: &[Bytes]) -> Result<usize, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidArgument("chave vazia".into()));
        }
        if values.is_empty() {
            return Err(StorageError::InvalidArgument(
                "nenhum valor para enfileirar".into(),
            ));
        }

        loop {
            let slot = self.shared.registry.get_or_create_queue(key);
            let pushed = slot.with(|value| match value {
                Value::Queue(queue) => {
                    queue.extend(values.iter().cloned());
                    Ok(queue.len())
                }
                Value::Scalar(_) => Err(StorageError::WrongType),
            });

            match pushed {
                Ok(Ok(len)) => {
                    slot.wake(values.len());
                    return Ok(len);
                }
                Ok(Err(e)) => return Err(e),
                // Perdeu a corrida com DEL/SET entre o lookup e o lock.
                Err(_) => continue,
            }
        }
    }

    /// Pop não bloqueante do fim da fila. `Ok(None)` = fila existe mas está vazia.
    pub fn qpop(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        let (_, popped) = self
            .with_live_slot(key, pop_tail)
            .ok_or(StorageError::KeyNotFound)?;
        popped
    }

    /// Tamanho da fila; chave ausente conta como fila vazia.
    pub fn qlen(&self, key: &str) -> Result<usize, StorageError> {
        match self.with_live_slot(key, |value| match value {
            Value::Queue(queue) => Ok(queue.len()),
            Value::Scalar(_) => Err(StorageError::WrongType),
        }) {
            Some((_, len)) => len,
            None => Ok(0),
        }
    }

    // --- Introspecção ---

    pub fn len(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Número de BQPOP suspensos no slot vivo da chave.
    pub fn waiters(&self, key: &str) -> usize {
        self.shared
            .registry
            .lookup(key)
            .map(|slot| slot.waiters())
            .unwrap_or(0)
    }

    /// Cancela todas as esperas atuais e futuras. Operações não bloqueantes
    /// continuam funcionando.
    pub fn shutdown(&self) {
        self.shared.shutdown.send_replace(true);
    }

    /// Executa `f` no slot vivo da chave, refazendo o lookup se o slot for
    /// aposentado entre o lookup e o lock. `None` se a chave não existe.
    pub(crate) fn with_live_slot<R>(
        &self,
        key: &str,
        mut f: impl FnMut(&mut Value) -> R,
    ) -> Option<(Arc<Slot>, R)> {
        loop {
            let slot = self.shared.registry.lookup(key)?;
            if let Ok(out) = slot.with(&mut f) {
                return Some((slot, out));
            }
        }
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn pop_tail(value: &mut Value) -> Result<Option<Bytes>, StorageError> {
    match value {
        Value::Queue(queue) => Ok(queue.pop_back()),
        Value::Scalar(_) => Err(StorageError::WrongType),
    }
}
