//! # dental-volume library
//!
//! This crate reconstructs a 3D volume from a directory of 2D DICOM
//! cross-sections and segments teeth from background tissue.
//!
//! This library is part of the dicom-rs ecosystem and leverages its
//! components to read per-slice pixel data and metadata. Slices are grouped
//! by Series Instance UID and stable-sorted by Slice Location, stacked into
//! an `ndarray` volume in physical intensity units (rescale slope/intercept
//! applied), resampled to a target voxel spacing with trilinear
//! interpolation, and segmented either by seeded k-means clustering or by an
//! intensity band. The resulting binary mask is refined with morphological
//! closing and opening. If the environment supports it the DICOM files are
//! loaded in parallel using rayon.
//!
//! Rendering, transfer functions and interactive viewing are left to a
//! downstream consumer; this crate hands off volumes and masks by value.
//!
//! # Examples
//!
//! ## Reconstructing and segmenting every series in a directory
//!
//! ```no_run
//! # use dental_volume::{PipelineConfig, process_directory};
//! # use std::path::PathBuf;
//! let config = PipelineConfig::default();
//! let output = process_directory(&PathBuf::from("dicom"), &config)
//!     .expect("should have processed files from directory");
//! for series in &output.reconstructions {
//!     println!("{}: {:?}", series.series_uid, series.mask.dim());
//! }
//! ```

pub mod config;
pub mod enums;
pub mod metrics;
pub mod morphology;
pub mod normalize;
pub mod pipeline;
pub mod resample;
pub mod segment;
pub mod series;
pub mod slice;
pub mod volume;

pub use config::PipelineConfig;
pub use enums::SegmentationMode;
pub use morphology::MaskRefiner;
pub use pipeline::{PipelineOutput, SeriesReconstruction, SkippedSeries, process_directory};
pub use series::Series;
pub use slice::SliceRecord;
pub use volume::{Volume, VolumeMetadata};
