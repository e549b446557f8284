//! Exported macros.

mod params;
