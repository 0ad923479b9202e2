#![forbid(unsafe_code)]
//! chunkflow-operators: narrow and narrow-state transformations over chunks.
//!
//! Design intent:
//! - Keep this crate pure and synchronous (no async, no I/O).
//! - Every buffer an algorithm produces is built through the `Allocator` it
//!   was handed, so the engine's memory cap covers operator output too.
//! - Per-partition state lives in the state adapter, never in the algorithm;
//!   dropping the state releases everything the partition retained.

pub mod adapter;
pub mod dataset;
pub mod kernels;
pub mod plan;
pub mod traits;

pub mod aggregate;
pub mod timeshift;
pub mod window;

pub use adapter::{new_narrow_state_transformation, new_narrow_transformation};
pub use dataset::{CollectingSink, TransportDataset};
pub use traits::{NarrowStateTransformation, NarrowTransformation, PartitionState, Transformation};

pub use aggregate::moments::{new_skew_transformation, new_stddev_transformation};
pub use aggregate::quantile::new_quantile_transformation;
pub use aggregate::sum::{new_count_transformation, new_sum_transformation};
pub use timeshift::new_timeshift_transformation;
pub use window::chande_momentum_oscillator::new_chande_momentum_oscillator_transformation;
pub use window::cumulative_sum::new_cumulative_sum_transformation;
pub use window::derivative::new_derivative_transformation;
pub use window::difference::new_difference_transformation;
pub use window::exponential::{
    new_double_exponential_moving_average_transformation,
    new_exponential_moving_average_transformation,
    new_triple_exponential_moving_average_transformation,
};
pub use window::integral::new_integral_transformation;
pub use window::kaufmans_ama::new_kaufmans_ama_transformation;
pub use window::moving_average::new_moving_average_transformation;
pub use window::relative_strength_index::new_relative_strength_index_transformation;
pub use window::triple_exponential_derivative::new_triple_exponential_derivative_transformation;
