mod common;
mod pipeline;
mod properties;
mod scenarios;
