// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod backend;
pub mod debounce;
pub mod derived;
pub mod edit;
pub mod error;
pub mod filter;
pub mod ids;
pub mod model;
pub mod normalize;
pub mod pins;
pub mod presets;
pub mod screens;
pub mod sort;
pub mod state;
pub mod values;

pub use backend::*;
pub use debounce::*;
pub use derived::*;
pub use edit::*;
pub use error::*;
pub use filter::*;
pub use ids::*;
pub use model::*;
pub use pins::*;
pub use presets::*;
pub use screens::*;
pub use sort::*;
pub use state::*;
