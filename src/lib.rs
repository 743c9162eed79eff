#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod catalog;
pub mod classification;
pub mod config;
pub mod model;
pub mod observability;
pub mod output;
pub mod pipeline;
pub mod util;
