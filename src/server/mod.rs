// HTTP surface.

pub mod handler;
