// Music catalog: search, up-next suggestions, and the trending aggregation.

pub mod traits;
pub mod trending;
pub mod types;
pub mod ytmusic;
