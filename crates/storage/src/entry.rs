use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// Tipo do valor armazenado.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Scalar(Bytes),
    /// Push e pop acontecem no fim (tail) da fila.
    Queue(VecDeque<Bytes>),
}

/// Por que um slot deixou de ser o slot vivo da sua chave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retired {
    Deleted,
    Replaced,
}

#[derive(Debug)]
struct SlotState {
    value: Value,
    retired: Option<Retired>,
}

/// Payload de uma chave. Cada slot tem lock e canal de wake próprios,
/// então operações em chaves diferentes nunca disputam o mesmo mutex.
#[derive(Debug)]
pub(crate) struct Slot {
    state: Mutex<SlotState>,
    notify: Notify,
    waiters: AtomicUsize,
}

impl Slot {
    pub(crate) fn new(value: Value) -> Self {
        Self {
            state: Mutex::new(SlotState {
                value,
                retired: None,
            }),
            notify: Notify::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    pub(crate) fn empty_queue() -> Self {
        Self::new(Value::Queue(VecDeque::new()))
    }

    /// Executa `f` sob o lock do slot, desde que ele ainda esteja vivo.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Result<R, Retired> {
        let mut state = self.lock();
        match state.retired {
            Some(reason) => Err(reason),
            None => Ok(f(&mut state.value)),
        }
    }

    /// Aposenta o slot e acorda todos os waiters para que observem o motivo.
    /// Deve ser chamado enquanto o shard do registry está travado para escrita.
    pub(crate) fn retire(&self, reason: Retired) {
        self.lock().retired = Some(reason);
        self.notify.notify_waiters();
    }

    /// Acorda no máximo um waiter por item produzido.
    pub(crate) fn wake(&self, produced: usize) {
        let n = produced.min(self.waiters());
        for _ in 0..n {
            self.notify.notify_one();
        }
    }

    pub(crate) fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }

    pub(crate) fn register_waiter(&self) -> WaiterGuard<'_> {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        WaiterGuard { slot: self }
    }

    pub(crate) fn waiters(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }

    // Um panic em outra task não deve envenenar a chave para sempre:
    // nenhuma operação deixa o estado pela metade.
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registro de um BQPOP suspenso. Desregistra no drop, inclusive quando o
/// future é cancelado.
pub(crate) struct WaiterGuard<'a> {
    slot: &'a Slot,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.slot.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}
