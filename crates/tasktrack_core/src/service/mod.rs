//! Use-case services over repositories, bus and codec.
//!
//! # Responsibility
//! - Run the save/delete flow: validate, store, commit, then notify.
//! - Import and export whole todo sets through the codec.
//! - Keep callers decoupled from storage and notification details.

pub mod context;
pub mod editor;
pub mod query;
pub mod transfer;

use crate::bus::BusError;
use crate::codec::CodecError;
use crate::model::todo::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    Repo(RepoError),
    Codec(CodecError),
    Bus(BusError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Bus(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "i/o error on `{}`: {source}", path.display()),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Bus(err) => Some(err),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<CodecError> for ServiceError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<BusError> for ServiceError {
    fn from(value: BusError) -> Self {
        Self::Bus(value)
    }
}
