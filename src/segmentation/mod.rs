mod population;
mod session;
pub mod types;

pub use population::PixelPopulation;
pub use session::{GrabCutSession, IterationReport, SessionState};
pub use types::{GrabCutConfig, Matte, MatteLabel, PixelClass, Rect};
