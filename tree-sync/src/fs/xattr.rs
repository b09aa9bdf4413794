//! Extended attribute access.
//!
//! Only the `user.*` namespace is read, which is the namespace an
//! unprivileged process can restore on the other side.

use std::io;
use std::path::Path;
use thiserror::Error;

const USER_PREFIX: &str = "user.";

#[derive(Error, Debug)]
pub enum XattrError {
    #[error("extended attributes are not supported by the filesystem")]
    Unsupported,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl XattrError {
    fn classify(error: io::Error) -> Self {
        if is_unsupported(&error) {
            XattrError::Unsupported
        } else {
            XattrError::Io(error)
        }
    }
}

#[cfg(unix)]
fn is_unsupported(error: &io::Error) -> bool {
    use nix::errno::Errno;

    if error.kind() == io::ErrorKind::Unsupported {
        return true;
    }
    match error.raw_os_error() {
        Some(code) => {
            let errno = Errno::from_raw(code);
            errno == Errno::ENOTSUP || errno == Errno::EOPNOTSUPP
        }
        None => false,
    }
}

#[cfg(not(unix))]
fn is_unsupported(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::Unsupported
}

/// Set one attribute on `path`.
#[cfg(unix)]
pub fn set_attribute(path: &Path, name: &str, value: &[u8]) -> Result<(), XattrError> {
    if !xattr::SUPPORTED_PLATFORM {
        return Err(XattrError::Unsupported);
    }
    xattr::set(path, name, value).map_err(XattrError::classify)
}

#[cfg(not(unix))]
pub fn set_attribute(_path: &Path, _name: &str, _value: &[u8]) -> Result<(), XattrError> {
    Err(XattrError::Unsupported)
}

/// Read every `user.*` attribute of `path`, in listing order.
#[cfg(unix)]
pub fn read_user_attributes(path: &Path) -> Result<Vec<(String, Vec<u8>)>, XattrError> {
    if !xattr::SUPPORTED_PLATFORM {
        return Err(XattrError::Unsupported);
    }

    let names = xattr::list(path).map_err(XattrError::classify)?;
    let mut attributes = Vec::new();
    for name in names {
        let Some(name) = name.to_str().map(str::to_owned) else {
            continue;
        };
        if !name.starts_with(USER_PREFIX) {
            continue;
        }
        if let Some(value) = xattr::get(path, &name).map_err(XattrError::classify)? {
            attributes.push((name, value));
        }
    }
    Ok(attributes)
}

#[cfg(not(unix))]
pub fn read_user_attributes(_path: &Path) -> Result<Vec<(String, Vec<u8>)>, XattrError> {
    Err(XattrError::Unsupported)
}
