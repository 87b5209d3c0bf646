use bytes::{BufMut, Bytes, BytesMut};
use filadb_common::{MAX_FRAME_SIZE, MAX_NESTING_DEPTH, ProtocolError};

/// Representação de um frame RESP2.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// Tenta decodificar um frame no início de `src`.
    ///
    /// Retorna `Ok(None)` quando o buffer ainda não contém um frame completo,
    /// ou o frame junto com o número de bytes consumidos.
    pub fn decode(src: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
        let mut reader = Reader { buf: src, pos: 0 };
        match reader.frame(0) {
            Ok(frame) => Ok(Some((frame, reader.pos))),
            Err(ProtocolError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encoda o frame no buffer de saída em formato RESP2.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => put_line(dst, b'+', s.as_bytes()),
            Frame::Error(s) => put_line(dst, b'-', s.as_bytes()),
            Frame::Integer(n) => put_line(dst, b':', n.to_string().as_bytes()),
            Frame::Bulk(data) => {
                put_line(dst, b'$', data.len().to_string().as_bytes());
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                put_line(dst, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }

    /// Helper: cria um Frame::Bulk a partir de &str.
    pub fn bulk(s: &str) -> Frame {
        Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Helper: cria um Array de Bulk strings a partir de &[&str].
    pub fn array_from_strs(strs: &[&str]) -> Frame {
        Frame::Array(strs.iter().map(|s| Frame::bulk(s)).collect())
    }
}

fn put_line(dst: &mut BytesMut, tag: u8, body: &[u8]) {
    dst.put_u8(tag);
    dst.put_slice(body);
    dst.put_slice(b"\r\n");
}

/// Leitor sobre um slice emprestado. Qualquer falta de bytes vira `Incomplete`.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn frame(&mut self, depth: usize) -> Result<Frame, ProtocolError> {
        match self.byte()? {
            b'+' => Ok(Frame::Simple(self.text()?)),
            b'-' => Ok(Frame::Error(self.text()?)),
            b':' => Ok(Frame::Integer(self.decimal()?)),
            b'$' => match self.length()? {
                None => Ok(Frame::Null),
                Some(len) => {
                    let data = self.take(len)?;
                    if self.take(2)? != b"\r\n" {
                        return Err(ProtocolError::InvalidEncoding(
                            "bulk sem terminador CRLF".into(),
                        ));
                    }
                    Ok(Frame::Bulk(Bytes::copy_from_slice(data)))
                }
            },
            b'*' => match self.length()? {
                None => Ok(Frame::Null),
                Some(count) => {
                    if depth >= MAX_NESTING_DEPTH {
                        return Err(ProtocolError::TooDeep(MAX_NESTING_DEPTH));
                    }
                    // Não pré-aloca com base no header: o peer controla `count`.
                    let mut items = Vec::new();
                    for _ in 0..count {
                        items.push(self.frame(depth + 1)?);
                    }
                    Ok(Frame::Array(items))
                }
            },
            other => Err(ProtocolError::InvalidFrameType(other)),
        }
    }

    fn byte(&mut self) -> Result<u8, ProtocolError> {
        let b = *self.buf.get(self.pos).ok_or(ProtocolError::Incomplete)?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(n).ok_or(ProtocolError::FrameTooLarge(n))?;
        let buf: &'a [u8] = self.buf;
        let slice = buf.get(self.pos..end).ok_or(ProtocolError::Incomplete)?;
        self.pos = end;
        Ok(slice)
    }

    fn line(&mut self) -> Result<&'a [u8], ProtocolError> {
        let buf: &'a [u8] = self.buf;
        let rest = &buf[self.pos..];
        let idx = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or(ProtocolError::Incomplete)?;
        self.pos += idx + 2;
        Ok(&rest[..idx])
    }

    fn text(&mut self) -> Result<String, ProtocolError> {
        let line = self.line()?;
        String::from_utf8(line.to_vec()).map_err(|e| ProtocolError::InvalidEncoding(e.to_string()))
    }

    fn decimal(&mut self) -> Result<i64, ProtocolError> {
        let line = self.line()?;
        std::str::from_utf8(line)
            .map_err(|e| ProtocolError::InvalidInteger(e.to_string()))?
            .parse::<i64>()
            .map_err(|e| ProtocolError::InvalidInteger(e.to_string()))
    }

    /// Header de tamanho de bulk/array. `-1` significa Null.
    fn length(&mut self) -> Result<Option<usize>, ProtocolError> {
        match self.decimal()? {
            -1 => Ok(None),
            n if n < 0 => Err(ProtocolError::InvalidLength(n)),
            n if n as u64 > MAX_FRAME_SIZE as u64 => Err(ProtocolError::FrameTooLarge(n as usize)),
            n => Ok(Some(n as usize)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(frame: &Frame) -> BytesMut {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        buf
    }

    #[test]
    fn encode_wire_format() {
        assert_eq!(&encoded(&Frame::Simple("OK".into()))[..], b"+OK\r\n");
        assert_eq!(&encoded(&Frame::Integer(-7))[..], b":-7\r\n");
        assert_eq!(&encoded(&Frame::Null)[..], b"$-1\r\n");
        assert_eq!(
            &encoded(&Frame::array_from_strs(&["QPOP", "jobs"]))[..],
            b"*2\r\n$4\r\nQPOP\r\n$4\r\njobs\r\n"
        );
    }

    #[test]
    fn decode_reports_consumed_bytes() {
        let data = b"*2\r\n$5\r\nQPUSH\r\n:3\r\n+PONG\r\n";
        let (frame, used) = Frame::decode(data).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Array(vec![Frame::bulk("QPUSH"), Frame::Integer(3)])
        );
        assert_eq!(&data[used..], b"+PONG\r\n");
    }

    #[test]
    fn bulk_may_contain_crlf_and_spaces() {
        let frame = Frame::Bulk(Bytes::from_static(b"a b\r\nc"));
        let buf = encoded(&frame);
        let (parsed, used) = Frame::decode(&buf).unwrap().unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn partial_input_is_not_an_error() {
        let full = encoded(&Frame::array_from_strs(&["BQPOP", "jobs", "1.5"]));
        for cut in 0..full.len() {
            assert!(Frame::decode(&full[..cut]).unwrap().is_none(), "cut at {cut}");
        }
    }

    #[test]
    fn null_bulk_and_null_array() {
        assert_eq!(Frame::decode(b"$-1\r\n").unwrap().unwrap().0, Frame::Null);
        assert_eq!(Frame::decode(b"*-1\r\n").unwrap().unwrap().0, Frame::Null);
    }

    #[test]
    fn invalid_frame_type() {
        assert!(matches!(
            Frame::decode(b"?invalid\r\n"),
            Err(ProtocolError::InvalidFrameType(b'?'))
        ));
    }

    #[test]
    fn negative_length_rejected() {
        assert!(matches!(
            Frame::decode(b"$-5\r\n"),
            Err(ProtocolError::InvalidLength(-5))
        ));
    }

    #[test]
    fn oversized_bulk_rejected() {
        let header = format!("${}\r\n", MAX_FRAME_SIZE + 1);
        assert!(matches!(
            Frame::decode(header.as_bytes()),
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn deep_nesting_rejected_without_recursing() {
        let nested = b"*1\r\n".repeat(200_000);
        assert!(matches!(
            Frame::decode(&nested),
            Err(ProtocolError::TooDeep(MAX_NESTING_DEPTH))
        ));
    }

    #[test]
    fn nesting_within_limit_accepted() {
        let mut data = b"*1\r\n".repeat(MAX_NESTING_DEPTH);
        data.extend_from_slice(b":1\r\n");
        let (frame, used) = Frame::decode(&data).unwrap().unwrap();
        assert_eq!(used, data.len());
        let mut depth = 0;
        let mut cur = &frame;
        while let Frame::Array(items) = cur {
            depth += 1;
            cur = &items[0];
        }
        assert_eq!(depth, MAX_NESTING_DEPTH);
        assert_eq!(*cur, Frame::Integer(1));
    }

    #[test]
    fn bulk_without_terminator_rejected() {
        assert!(matches!(
            Frame::decode(b"$2\r\nokXX"),
            Err(ProtocolError::InvalidEncoding(_))
        ));
    }
}
