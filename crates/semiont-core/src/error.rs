use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(
        "Service '{service}' has no command configured. Add \"command\" to your service configuration."
    )]
    MissingCommand { service: String },

    #[error("Unknown platform type '{0}'. Expected one of: process, container, aws, mock")]
    UnknownPlatform(String),

    #[error("Unknown verb '{0}'")]
    UnknownVerb(String),

    #[error("Service '{service}' has no platform. Set \"platform.type\" or an environment default")]
    MissingPlatform { service: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
