pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod holidays;
pub mod lines;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod split;
