//! Drive many NeoPixel-style (WS2812) LED strips from one parallel LCD peripheral.
//!
//! Every strip gets a *lane*: one data line of the peripheral's parallel bus. All lanes share a
//! single DMA transmit buffer, each strip ORs its own encoded bits into its lane, and the
//! hardware transfer starts only once every registered strip has supplied its frame.
//!
//! Start with [`led_strip::MuxStrip`] for the per-strip driver and the [`lcd_mux!`] macro for the
//! shared per-bus context. The building blocks live in [`lcd_mux`].
//!
//! # Glossary
//!
//! - **Lane:** one output line of the parallel bus, identified by a [`LaneId`](lcd_mux::LaneId).
//!   An 8-bit bus has 8 lanes; a 16-bit bus has 16.
//! - **Cell:** one peripheral clock period on all lanes at once (one byte on an 8-bit bus). Each
//!   protocol bit is sent as [`CELLS_PER_BIT`](lcd_mux::CELLS_PER_BIT) cells.
//! - **Cycle:** the span between two hardware transfers. Every registered lane fills the shared
//!   buffer once per cycle.
//! - **DMA ([Direct Memory Access](https://en.wikipedia.org/wiki/Direct_memory_access)):** the
//!   engine that streams the shared buffer to the peripheral, following a chain of descriptors.
#![no_std]

// Must come first so the logging macros are visible to every later module.
mod fmt;

mod error;
pub mod lcd_mux;
pub mod led_strip;
pub mod peripheral;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};

#[doc(hidden)] // Used by `lcd_mux!` expansions in downstream crates
pub mod __private {
    pub use static_cell;
}
