//! Protocolo do BQPOP.
//!
//! Estados: imediato (há item) → satisfeito; fila vazia com timeout 0 →
//! `QueueEmpty`; caso contrário o chamador se registra como waiter e
//! suspende *sem* manter o lock do slot, até que um push o acorde, a chave
//! seja removida, o prazo expire ou o store seja desligado.

use bytes::Bytes;
use tokio::time::{Duration, Instant, sleep_until};
use tracing::debug;

use filadb_common::StorageError;

use crate::db::{Db, pop_tail};
use crate::entry::Retired;

impl Db {
    /// Pop bloqueante do fim da fila, esperando até `timeout_secs` segundos.
    ///
    /// Não cria a fila: chave ausente falha com `KeyNotFound`. Se o future for
    /// descartado (cliente desconectou), o waiter é desregistrado no drop.
    pub async fn bqpop(&self, key: &str, timeout_secs: f64) -> Result<Bytes, StorageError> {
        let timeout = Duration::try_from_secs_f64(timeout_secs).map_err(|_| {
            StorageError::InvalidArgument(format!(
                "timeout deve ser finito e não negativo: {timeout_secs}"
            ))
        })?;
        let deadline = Instant::now()
            .checked_add(timeout)
            .ok_or_else(|| StorageError::InvalidArgument("timeout grande demais".into()))?;

        let (slot, popped) = self
            .with_live_slot(key, pop_tail)
            .ok_or(StorageError::KeyNotFound)?;
        if let Some(item) = popped? {
            return Ok(item);
        }
        if timeout.is_zero() {
            return Err(StorageError::QueueEmpty);
        }

        let mut cancel = self.shared.shutdown.subscribe();
        let _waiter = slot.register_waiter();
        debug!("BQPOP aguardando em '{key}' por {timeout:?}");

        loop {
            // Habilita o Notified antes de checar a fila: um push entre o
            // check e o select não pode ser perdido.
            let notified = slot.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match slot.with(pop_tail) {
                Ok(Ok(Some(item))) => return Ok(item),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => return Err(e),
                Err(Retired::Deleted) => {
                    debug!("BQPOP em '{key}': chave removida");
                    return Err(StorageError::KeyDeleted);
                }
                Err(Retired::Replaced) => {
                    // SET trocou a fila por um escalar: nenhum push vai chegar
                    // neste slot, resta esperar o prazo.
                    debug!("BQPOP em '{key}': fila substituída por SET, aguardando prazo");
                    tokio::select! {
                        _ = sleep_until(deadline) => return Err(StorageError::TimedOut),
                        _ = cancel.wait_for(|stop| *stop) => return Err(StorageError::Cancelled),
                    }
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_until(deadline) => {
                    debug!("BQPOP em '{key}': timeout");
                    return Err(StorageError::TimedOut);
                }
                _ = cancel.wait_for(|stop| *stop) => return Err(StorageError::Cancelled),
            }
        }
    }
}
