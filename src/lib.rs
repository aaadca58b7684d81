#![allow(clippy::too_many_arguments)]

// Logger first so its macros are visible to every module below.
#[macro_use]
pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod glyphs;
pub mod io;
pub mod ledger;
pub mod pattern;
pub mod project;
pub mod raster;
pub mod settings;
