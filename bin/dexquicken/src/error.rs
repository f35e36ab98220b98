use dexquicken::{dex, quicken};
use std::io;

/// Ways a command can fail
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Dex(dex::Error),
    Quicken(quicken::Error),

    /// `--offset` is past the end of the input
    OffsetPastEnd { offset: usize, len: usize },
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<dex::Error> for Error {
    fn from(err: dex::Error) -> Error {
        Error::Dex(err)
    }
}

impl From<quicken::Error> for Error {
    fn from(err: quicken::Error) -> Error {
        Error::Quicken(err)
    }
}
