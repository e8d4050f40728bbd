//! Data layer for epicurve.
//!
//! Reads raw observation tables and population references, aggregates rows
//! into analysis entities, aligns series on threshold crossings, rescales
//! them per capita and writes the resulting tables.

pub mod aggregator;
pub mod analysis;
pub mod export;
pub mod population;
pub mod reader;
pub mod trigger;

pub use epicurve_core as core;
