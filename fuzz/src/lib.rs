//! Fuzz targets for gradebook components.
//!
//! Each module exposes a [gradebook_harness::target::Target] and a `build` function usable as a
//! [gradebook_harness::target::Provider] by the `gradebook-fuzz` binary.

pub mod snapshot;
