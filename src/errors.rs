use std::io;

#[derive(Debug)]
pub enum Error {
    IO(io::Error),
    Http(reqwest::Error),
    Json(serde_json::Error),
    // The dataset identifier is not in the known endpoint table
    UnknownDataset(String),
    // A credential record is missing or has an empty required field
    MissingCredential(&'static str),
    AuthError(String),
    SourceError(String),
    NotHdf5(String),
    InvalidData(String),
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::IO(value)
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Http(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value)
    }
}
