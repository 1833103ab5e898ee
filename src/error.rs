use derive_more::From;
use k8s_openapi::serde_json;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Kubeconfig(kube::config::KubeconfigError),

    #[from]
    Io(std::io::Error),

    /// Writing a watch event to the console failed
    Console(std::io::Error),

    /// The user's home directory could not be resolved
    HomeDirNotFound,

    /// The watch loop gave up after too many consecutive failures
    WatchRetriesExhausted { attempts: u32, last: Box<Error> },

    /// Custom error message
    Custom(String),
}

impl Error {
    /// True when the API server rejected our credentials
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Kube(kube::Error::Api(api_error)) => matches!(api_error.code, 401 | 403),
            Self::Kube(kube::Error::Auth(_)) => true,
            _ => false,
        }
    }

    /// True when the API server reported the object as missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(api_error)) if api_error.code == 404)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::HomeDirNotFound => write!(fmt, "error getting user home dir"),
            Self::WatchRetriesExhausted { attempts, last } => {
                write!(fmt, "watch gave up after {attempts} attempts: {last}")
            }
            Self::Console(e) => write!(fmt, "console write failed: {e}"),
            Self::Custom(message) => write!(fmt, "{message}"),
            _ => write!(fmt, "{self:?}"),
        }
    }
}

impl std::error::Error for Error {}
