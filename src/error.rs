use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no write access to device \"{}\"", .path.display())]
    NoWriteAccess { path: PathBuf },

    #[error("device or resource busy")]
    Busy,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("uinput provisioning failed while {stage}: {source}")]
    Provision {
        stage: ProvisionStage,
        #[source]
        source: io::Error,
    },

    #[error("uinput device \"{name}\" was created but its event node could not be found")]
    Unresolved { name: String },

    #[error("device is closed")]
    Closed,
}
impl Error {
    /// Adapter for `map_err` tagging a platform failure with the operation name
    pub(crate) fn io(op: &'static str) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Io { op, source }
    }

    pub(crate) fn provision(stage: ProvisionStage) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Provision { stage, source }
    }

    /// Kernel errno carried by this error, if any
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Open { source, .. } | Error::Io { source, .. } | Error::Provision { source, .. } => {
                source.raw_os_error()
            }
            Error::Busy => Some(libc::EBUSY),
            Error::InvalidArgument => Some(libc::EINVAL),
            _ => None,
        }
    }
}

/// Step of virtual device provisioning that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    Validate,
    Open,
    EnableCapabilities,
    Setup,
    Create,
}
impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionStage::Validate => "validating the uinput node",
            ProvisionStage::Open => "opening the uinput node",
            ProvisionStage::EnableCapabilities => "enabling capabilities",
            ProvisionStage::Setup => "committing device identity",
            ProvisionStage::Create => "creating the device",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_message_names_stage() {
        let err = Error::Provision {
            stage: ProvisionStage::EnableCapabilities,
            source: io::Error::from_raw_os_error(libc::EINVAL),
        };
        assert!(err.to_string().contains("enabling capabilities"));
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }

    #[test]
    fn test_no_write_access_is_distinct() {
        let err = Error::NoWriteAccess {
            path: PathBuf::from("/dev/input/event3"),
        };
        assert!(matches!(err, Error::NoWriteAccess { .. }));
        assert_eq!(err.to_string(), "no write access to device \"/dev/input/event3\"");
        assert_eq!(err.raw_os_error(), None);
    }
}
