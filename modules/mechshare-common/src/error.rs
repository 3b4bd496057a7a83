use thiserror::Error;

#[derive(Error, Debug)]
pub enum MechshareError {
    #[error("Configuration error: {0}")]
    Config(String),
}
