pub mod apply;
pub mod bands;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod profile;
pub mod stage;
