use thiserror::Error;

#[derive(Debug, Error)]
pub enum StitchError {
    #[error("no tiles to stitch")]
    NoTiles,

    /// Tiles must be ordered by strictly increasing scroll offset and
    /// share one raster width.
    #[error("invalid tile set: {0}")]
    InvalidTiles(String),

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image encode failed: {0}")]
    Encode(String),
}
