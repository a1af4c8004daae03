pub mod arena;
pub mod debug;
pub mod registry;
pub mod site;
pub mod stats;
