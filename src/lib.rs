//! Terminal client for the counters of a dataflow controller.
//!
//! The counters report is fetched from the controller api, shown in a
//! filterable and sortable table, and flow managers can reset single counters.

pub mod cli;
pub mod client;
pub mod controller;
pub mod domain;
pub mod inputter;
pub mod model;
pub mod ui;
