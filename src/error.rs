use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no reply from device within {0:?}")]
    TimedOut(Duration),

    #[error("malformed response: {len} bytes, need at least {min}")]
    MalformedResponse { len: usize, min: usize },

    #[error("no device answered discovery within {0:?}")]
    NotFound(Duration),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
