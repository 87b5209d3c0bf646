use tokio::sync::broadcast;
use tracing::debug;

use filadb_common::{ConnectionError, StorageError};
use filadb_protocol::{Command, Frame};
use filadb_storage::Db;

use crate::Connection;

/// Loop principal de tratamento de uma conexão.
pub async fn handle_connection(
    mut conn: Connection,
    db: Db,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), ConnectionError> {
    loop {
        let frame = tokio::select! {
            result = conn.read_frame() => result?,
            _ = shutdown.recv() => {
                return Ok(());
            }
        };

        let frame = match frame {
            Some(f) => f,
            None => return Ok(()), // EOF
        };

        let cmd = match Command::from_frame(frame) {
            Ok(cmd) => cmd,
            Err(e) => {
                let response = Frame::Error(format!("ERR {e}"));
                conn.write_frame(&response).await?;
                continue;
            }
        };

        debug!("comando recebido: {cmd:?}");

        let response = if cmd.is_blocking() {
            // Enquanto espera, observa o peer: se ele sair, o future do BQPOP
            // é descartado e o waiter se desregistra. O shutdown do servidor
            // chega pelo próprio BQPOP (CANCELLED), que é respondido antes de
            // a conexão fechar.
            let wait = execute_command(&cmd, &db);
            tokio::pin!(wait);
            tokio::select! {
                response = &mut wait => response,
                result = conn.closed() => {
                    result?;
                    debug!("peer desconectou durante espera: {cmd:?}");
                    return Ok(());
                }
            }
        } else {
            execute_command(&cmd, &db).await
        };

        conn.write_frame(&response).await?;
    }
}

/// Executa um comando e retorna o Frame de resposta.
async fn execute_command(cmd: &Command, db: &Db) -> Frame {
    match cmd {
        Command::Ping(msg) => match msg {
            Some(m) => Frame::Bulk(m.clone()),
            None => Frame::Simple("PONG".into()),
        },
        Command::Echo(msg) => Frame::Bulk(msg.clone()),
        Command::Get(key) => match db.get(key) {
            Ok(value) => Frame::Bulk(value),
            Err(StorageError::KeyNotFound) => Frame::Null,
            Err(e) => error_frame(&e),
        },
        Command::Set { key, value } => match db.set(key.clone(), value.clone()) {
            Ok(()) => Frame::Simple("OK".into()),
            Err(e) => error_frame(&e),
        },
        Command::Delete(key) => Frame::Integer(db.delete(key) as i64),
        Command::Exists(key) => Frame::Integer(db.exists(key) as i64),
        Command::QPush { key, values } => match db.qpush(key, values) {
            Ok(len) => Frame::Integer(len as i64),
            Err(e) => error_frame(&e),
        },
        Command::QPop(key) => match db.qpop(key) {
            Ok(Some(value)) => Frame::Bulk(value),
            Ok(None) => Frame::Null,
            Err(e) => error_frame(&e),
        },
        Command::BQPop { key, timeout } => match db.bqpop(key, *timeout).await {
            Ok(value) => Frame::Bulk(value),
            Err(e) => error_frame(&e),
        },
        Command::QLen(key) => match db.qlen(key) {
            Ok(len) => Frame::Integer(len as i64),
            Err(e) => error_frame(&e),
        },
        Command::DbSize => Frame::Integer(db.len() as i64),
        Command::Unknown(name) => Frame::Error(format!("ERR unknown command '{name}'")),
    }
}

/// Cada condição do store tem seu próprio prefixo para o cliente distinguir.
fn error_frame(err: &StorageError) -> Frame {
    let msg = match err {
        StorageError::WrongType => {
            "WRONGTYPE Operation against a key holding the wrong kind of value".to_string()
        }
        StorageError::KeyNotFound => "NOTFOUND no such key".to_string(),
        StorageError::QueueEmpty => "EMPTY queue is empty".to_string(),
        StorageError::TimedOut => "TIMEOUT no item arrived before the deadline".to_string(),
        StorageError::KeyDeleted => "DELETED key was deleted while waiting".to_string(),
        StorageError::Cancelled => "CANCELLED wait was cancelled".to_string(),
        StorageError::InvalidArgument(reason) => format!("ERR {reason}"),
    };
    Frame::Error(msg)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn qpop_distinguishes_empty_from_absent() {
        let db = Db::new();
        assert_eq!(
            execute_command(&Command::QPop("jobs".into()), &db).await,
            Frame::Error("NOTFOUND no such key".into())
        );

        db.qpush("jobs", &[Bytes::from("a")]).unwrap();
        db.qpop("jobs").unwrap();
        assert_eq!(
            execute_command(&Command::QPop("jobs".into()), &db).await,
            Frame::Null
        );
    }

    #[tokio::test]
    async fn bqpop_zero_timeout_reports_empty() {
        let db = Db::new();
        db.qpush("jobs", &[Bytes::from("a")]).unwrap();
        db.qpop("jobs").unwrap();
        let cmd = Command::BQPop {
            key: "jobs".into(),
            timeout: 0.0,
        };
        assert_eq!(
            execute_command(&cmd, &db).await,
            Frame::Error("EMPTY queue is empty".into())
        );
    }

    #[test]
    fn every_condition_has_a_distinct_prefix() {
        let errors = [
            StorageError::WrongType,
            StorageError::KeyNotFound,
            StorageError::QueueEmpty,
            StorageError::TimedOut,
            StorageError::KeyDeleted,
            StorageError::Cancelled,
            StorageError::InvalidArgument("x".into()),
        ];
        let prefixes: std::collections::HashSet<String> = errors
            .iter()
            .map(|e| match error_frame(e) {
                Frame::Error(msg) => msg.split(' ').next().unwrap_or_default().to_string(),
                other => panic!("esperado erro, veio {other:?}"),
            })
            .collect();
        assert_eq!(prefixes.len(), errors.len());
    }
}
