use thiserror::Error;

/// Link-level and transport failures. All of these are transient from the
/// device's point of view: the next scheduled cycle simply tries again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("link down")]
    LinkDown,
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("timed out")]
    Timeout,
    #[error("connection lost after {received} of {expected} bytes")]
    Disconnected { received: usize, expected: usize },
    #[error("response has no content length")]
    MissingLength,
    #[error("transport: {0}")]
    Transport(String),
}

/// Reasons the streaming JPEG decoder rejects or abandons a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("not a JPEG stream")]
    NotJpeg,
    #[error("stream truncated")]
    Truncated,
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("malformed {0} segment")]
    Malformed(&'static str),
    #[error("invalid huffman code")]
    BadHuffmanCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("cannot allocate {requested} bytes")]
    Memory { requested: usize },
}

impl FetchError {
    /// Short label for the on-screen error card.
    pub fn label(&self) -> String {
        match self {
            FetchError::Network(_) => "Network error".to_string(),
            FetchError::Http(status) => format!("HTTP {}", status),
            FetchError::Decode(_) => "Decode error".to_string(),
            FetchError::Memory { .. } => "Out of memory".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("bad weather payload: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for WeatherError {
    fn from(e: serde_json::Error) -> Self {
        WeatherError::Parse(e.to_string())
    }
}

impl WeatherError {
    pub fn label(&self) -> &'static str {
        match self {
            WeatherError::Network(_) => "Network error",
            WeatherError::Http(_) => "Server error",
            WeatherError::Parse(_) => "Bad data",
        }
    }
}

/// Touch controller faults. A single bad poll is reported as "no touch".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TouchError {
    #[error("i2c transfer failed")]
    Bus,
    #[error("frame too short ({0} bytes)")]
    ShortFrame(usize),
    #[error("point ({x}, {y}) outside panel")]
    OutOfRange { x: u16, y: u16 },
}
