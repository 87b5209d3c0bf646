use bytes::Bytes;
use filadb_common::CommandError;

use crate::{Frame, Parse};

/// Enum com todos os comandos suportados.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping(Option<Bytes>),
    Echo(Bytes),
    Get(String),
    Set {
        key: String,
        value: Bytes,
    },
    Delete(String),
    Exists(String),
    QPush {
        key: String,
        values: Vec<Bytes>,
    },
    QPop(String),
    /// Pop bloqueante; `timeout` em segundos, 0 = não espera.
    BQPop {
        key: String,
        timeout: f64,
    },
    QLen(String),
    DbSize,
    Unknown(String),
}

impl Command {
    /// Faz o parse de um Frame em um Command.
    pub fn from_frame(frame: Frame) -> Result<Command, CommandError> {
        let mut parse = Parse::new(frame)?;
        let cmd_name = parse.next_string()?.to_uppercase();

        let cmd = match cmd_name.as_str() {
            "PING" => {
                let msg = if parse.has_remaining() {
                    Some(parse.next_bytes()?)
                } else {
                    None
                };
                Command::Ping(msg)
            }
            "ECHO" => Command::Echo(parse.next_bytes()?),
            "GET" => Command::Get(single_key(&mut parse, "GET")?),
            "SET" => {
                let key = parse.next_string()?;
                let value = parse.next_bytes()?;
                Command::Set { key, value }
            }
            "DEL" | "DELETE" => Command::Delete(single_key(&mut parse, &cmd_name)?),
            "EXISTS" => Command::Exists(single_key(&mut parse, "EXISTS")?),
            "QPUSH" => {
                let key = parse.next_string()?;
                if !parse.has_remaining() {
                    return Err(CommandError::WrongArity("QPUSH".into()));
                }
                let mut values = Vec::new();
                while parse.has_remaining() {
                    values.push(parse.next_bytes()?);
                }
                Command::QPush { key, values }
            }
            "QPOP" => Command::QPop(single_key(&mut parse, "QPOP")?),
            "BQPOP" => {
                let key = parse.next_string()?;
                if !parse.has_remaining() {
                    return Err(CommandError::WrongArity("BQPOP".into()));
                }
                let timeout = parse.next_timeout()?;
                Command::BQPop { key, timeout }
            }
            "QLEN" => Command::QLen(single_key(&mut parse, "QLEN")?),
            "DBSIZE" => Command::DbSize,
            _ => return Ok(Command::Unknown(cmd_name)),
        };

        parse.finish()?;
        Ok(cmd)
    }

    /// Comandos que podem suspender a conexão esperando por dados.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Command::BQPop { timeout, .. } if *timeout > 0.0)
    }
}

fn single_key(parse: &mut Parse, name: &str) -> Result<String, CommandError> {
    if !parse.has_remaining() {
        return Err(CommandError::WrongArity(name.into()));
    }
    parse.next_string()
}
