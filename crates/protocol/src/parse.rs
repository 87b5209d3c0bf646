use bytes::Bytes;
use filadb_common::CommandError;

use crate::Frame;

/// Cursor sobre os argumentos de um Frame::Array.
pub struct Parse {
    parts: std::vec::IntoIter<Frame>,
}

impl Parse {
    /// Cria um Parse a partir de um Frame. O frame deve ser Array.
    pub fn new(frame: Frame) -> Result<Parse, CommandError> {
        match frame {
            Frame::Array(parts) => Ok(Parse {
                parts: parts.into_iter(),
            }),
            _ => Err(CommandError::InvalidArgument("esperado array".into())),
        }
    }

    /// Retorna o próximo elemento como String (de Bulk ou Simple).
    pub fn next_string(&mut self) -> Result<String, CommandError> {
        match self.next()? {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(data) => String::from_utf8(data.to_vec())
                .map_err(|_| CommandError::InvalidArgument("string UTF-8 inválida".into())),
            _ => Err(CommandError::InvalidArgument(
                "esperado string ou bulk".into(),
            )),
        }
    }

    /// Retorna o próximo elemento como Bytes (de Bulk).
    pub fn next_bytes(&mut self) -> Result<Bytes, CommandError> {
        match self.next()? {
            Frame::Bulk(data) => Ok(data),
            Frame::Simple(s) => Ok(Bytes::from(s)),
            _ => Err(CommandError::InvalidArgument("esperado bulk".into())),
        }
    }

    /// Lê um timeout em segundos (aceita fração, ex: "0.25").
    pub fn next_timeout(&mut self) -> Result<f64, CommandError> {
        let raw = match self.next()? {
            Frame::Integer(n) => return non_negative(n as f64, &n.to_string()),
            Frame::Bulk(data) => String::from_utf8_lossy(&data).into_owned(),
            Frame::Simple(s) => s,
            _ => return Err(CommandError::InvalidTimeout("esperado número".into())),
        };
        let secs = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| CommandError::InvalidTimeout(format!("'{raw}' não é um número")))?;
        non_negative(secs, &raw)
    }

    /// Verifica se todos os argumentos foram consumidos.
    pub fn finish(&self) -> Result<(), CommandError> {
        if self.has_remaining() {
            Err(CommandError::InvalidArgument(
                "argumentos extras não esperados".into(),
            ))
        } else {
            Ok(())
        }
    }

    /// Verifica se ainda há argumentos restantes.
    pub fn has_remaining(&self) -> bool {
        !self.parts.as_slice().is_empty()
    }

    fn next(&mut self) -> Result<Frame, CommandError> {
        self.parts
            .next()
            .ok_or_else(|| CommandError::InvalidArgument("argumentos insuficientes".into()))
    }
}

fn non_negative(secs: f64, raw: &str) -> Result<f64, CommandError> {
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(CommandError::InvalidTimeout(format!(
            "'{raw}' deve ser finito e não negativo"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_extracts_strings() {
        let frame = Frame::array_from_strs(&["SET", "key", "value"]);
        let mut parse = Parse::new(frame).unwrap();
        assert_eq!(parse.next_string().unwrap(), "SET");
        assert_eq!(parse.next_string().unwrap(), "key");
        assert_eq!(parse.next_bytes().unwrap(), Bytes::from("value"));
        parse.finish().unwrap();
    }

    #[test]
    fn parse_timeout_accepts_fractions_and_integers() {
        let mut parse = Parse::new(Frame::Array(vec![
            Frame::bulk("0.25"),
            Frame::bulk("3"),
            Frame::Integer(0),
        ]))
        .unwrap();
        assert_eq!(parse.next_timeout().unwrap(), 0.25);
        assert_eq!(parse.next_timeout().unwrap(), 3.0);
        assert_eq!(parse.next_timeout().unwrap(), 0.0);
    }

    #[test]
    fn parse_timeout_rejects_garbage() {
        for bad in ["abc", "-1", "NaN", "inf", ""] {
            let mut parse = Parse::new(Frame::array_from_strs(&[bad])).unwrap();
            assert!(
                matches!(parse.next_timeout(), Err(CommandError::InvalidTimeout(_))),
                "{bad:?} deveria ser rejeitado"
            );
        }
    }

    #[test]
    fn parse_not_array_fails() {
        let frame = Frame::Simple("OK".into());
        assert!(Parse::new(frame).is_err());
    }

    #[test]
    fn parse_extra_args_fails_finish() {
        let frame = Frame::array_from_strs(&["PING", "extra"]);
        let mut parse = Parse::new(frame).unwrap();
        parse.next_string().unwrap();
        assert!(parse.finish().is_err());
    }

    #[test]
    fn parse_insufficient_args() {
        let frame = Frame::array_from_strs(&["GET"]);
        let mut parse = Parse::new(frame).unwrap();
        parse.next_string().unwrap();
        assert!(parse.next_string().is_err());
    }
}
