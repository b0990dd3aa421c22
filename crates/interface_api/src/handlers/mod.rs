//! Request handlers

pub mod catalogs;
pub mod injected_lines;
pub mod redirects;
