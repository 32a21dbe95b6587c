// Audio relay: range arithmetic, window slicing, and the two relay paths.

pub mod audio;
pub mod direct;
pub mod range;
pub mod slicer;
pub mod stats;
