//! Interactive foreground extraction with GrabCut.
//!
//! A [`GrabCutSession`] owns the matte and the two color mixture models.
//! Each iteration re-fits the models to the current labeling and solves a
//! min-cut over per-pixel likelihood and contrast-sensitive smoothness costs.
//!
//! ```no_run
//! use grabcut::{GrabCutConfig, GrabCutSession, PixelClass, Rect};
//!
//! # fn main() -> Result<(), grabcut::SegmentationError> {
//! let image = image::RgbImage::new(64, 48);
//! let mut session = GrabCutSession::initialize(image, Rect::new(8, 8, 40, 30), GrabCutConfig::default())?;
//! session.add_seed(20, 20, PixelClass::Foreground)?;
//! let report = session.run_iteration()?;
//! println!("flow={:.2} foreground={}", report.flow, report.foreground);
//! let mask = session.current_matte().foreground_mask();
//! # let _ = mask;
//! # Ok(())
//! # }
//! ```

pub mod energy;
pub mod error;
pub mod gmm;
pub mod input;
pub mod mincut;
pub mod output;
pub mod segmentation;

pub use error::{SegmentationError, SolverError};
pub use mincut::{DinicBackend, MinCutBackend, MinCutGraph, TerminalSide};
pub use segmentation::{
    GrabCutConfig, GrabCutSession, IterationReport, Matte, MatteLabel, PixelClass, Rect,
    SessionState,
};
