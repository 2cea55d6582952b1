#[macro_use]
pub mod errors;
#[macro_use]
pub mod misc_utils;

pub mod aggregator;
pub mod backend;
pub mod column;
pub mod config;
pub mod graph_data;
pub mod logger;
pub mod mango;
pub mod mango_builder;
pub mod operator_converter;
pub mod pager;
pub mod query;
pub mod query_converter;
pub mod record;
pub mod time_grouping;

#[macro_use]
extern crate guard;

#[macro_use]
extern crate slog;
