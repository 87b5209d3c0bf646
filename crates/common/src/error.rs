/// Erros de decodificação do protocolo RESP.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame incompleto")]
    Incomplete,
    #[error("byte de tipo inválido: {0:#x}")]
    InvalidFrameType(u8),
    #[error("inteiro inválido: {0}")]
    InvalidInteger(String),
    #[error("comprimento inválido: {0}")]
    InvalidLength(i64),
    #[error("frame excede tamanho máximo ({0} bytes)")]
    FrameTooLarge(usize),
    #[error("encoding inválido: {0}")]
    InvalidEncoding(String),
    #[error("aninhamento de arrays excede {0} níveis")]
    TooDeep(usize),
}

/// Condições reportadas pelo store. Todas são recuperáveis e visíveis ao cliente.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("operação contra chave com tipo errado")]
    WrongType,
    #[error("chave não encontrada")]
    KeyNotFound,
    #[error("fila vazia")]
    QueueEmpty,
    #[error("tempo de espera esgotado")]
    TimedOut,
    #[error("chave removida durante a espera")]
    KeyDeleted,
    #[error("espera cancelada")]
    Cancelled,
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
}

/// Erros de conexão TCP.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("conexão resetada pelo peer")]
    ConnectionReset,
    #[error("protocolo: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Erros de parsing/validação de comandos.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("número errado de argumentos para '{0}'")]
    WrongArity(String),
    #[error("timeout inválido: {0}")]
    InvalidTimeout(String),
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
}
