use thiserror::Error;

use crate::store::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// User-correctable command problems. The `Display` text is what the HTTP
/// layer sends back with a 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unit is not located on tile {tile}")]
    NotAtLocation { tile: String },
    #[error("The target tile is not in range.")]
    OutOfRange,
    #[error("The target tile is water and you cannot swim.")]
    Impassable,
    #[error("Unknown command.")]
    UnknownCommand,
    #[error("Missing field '{0}'.")]
    MissingField(&'static str),
    #[error("Unit {unit} does not belong to player {player}.")]
    NotOwned { unit: String, player: String },
    #[error("Malformed command: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("unit '{unit}' was moved by a concurrent command")]
    Conflict { unit: String },
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("no tile found near ({lat}, {lon})")]
    NoTileFound { lat: f64, lon: f64 },
    #[error("no land tile found near ({lat}, {lon})")]
    NoLandTile { lat: f64, lon: f64 },
    #[error("failed to decode record '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("world generation in progress")]
    Generating,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("elevation raster error: {0}")]
    Raster(String),
    #[error("mesh error: {0}")]
    Mesh(String),
    #[error("every {kind} id drawn in {attempts} attempts was already taken")]
    IdsExhausted { kind: &'static str, attempts: usize },
    #[error("command task failed: {0}")]
    Command(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }
}
