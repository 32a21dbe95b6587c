// Media resolution: identifiers, resolved formats, and resolver backends.

pub mod traits;
pub mod types;
pub mod ytdlp;
