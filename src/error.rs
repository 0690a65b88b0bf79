use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("buffer is full")]
    BufferFull,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
