use super::population::PixelPopulation;
use super::types::{GrabCutConfig, Matte, MatteLabel, PixelClass, Rect};
use crate::energy::build_energy;
use crate::error::{Result, SegmentationError};
use crate::gmm::GaussianMixture;
use crate::mincut::{solve_energy, DinicBackend, MinCutBackend, TerminalSide};
use image::RgbImage;
use std::borrow::Cow;

/// Lifecycle of a segmentation session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    RectCommitted,
    /// Number of completed iterations
    Iterating(usize),
}

/// Diagnostics of one completed iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// 1-based iteration number
    pub iteration: usize,
    /// Max-flow value of the solve
    pub flow: f64,
    /// Pixels labeled foreground (definite or probable) afterwards
    pub foreground: usize,
    /// Probable pixels whose class flipped in this iteration
    pub changed: usize,
}

#[derive(Debug, Clone)]
struct ClassModels {
    background: GaussianMixture,
    foreground: GaussianMixture,
}

#[derive(Debug, Clone)]
struct Populations {
    background: PixelPopulation,
    foreground: PixelPopulation,
}

impl Populations {
    fn collect(image: &RgbImage, matte: &Matte) -> Self {
        let background = PixelPopulation::collect(image, matte, PixelClass::Background);
        let foreground = PixelPopulation::collect(image, matte, PixelClass::Foreground);
        tracing::debug!(
            background = background.len(),
            foreground = foreground.len(),
            "rebuilt pixel populations"
        );
        Self {
            background,
            foreground,
        }
    }

    /// Both models need at least one pixel to be initialized
    fn ensure_non_empty(&self) -> Result<()> {
        for population in [&self.background, &self.foreground] {
            if population.is_empty() {
                return Err(SegmentationError::EmptyPopulation(population.class()));
            }
        }
        Ok(())
    }
}

/// Assign and re-estimate one class model; an empty population leaves it as is.
fn refit(model: &mut GaussianMixture, population: &PixelPopulation) -> Result<()> {
    let _span = tracing::debug_span!("refit", class = %population.class()).entered();
    if population.is_empty() {
        tracing::debug!("no pixels left in class, keeping model parameters");
        return Ok(());
    }
    let assignment = model.assign(population.colors());
    model.reestimate(population.colors(), &assignment)
}

/// Interactive GrabCut session owning the matte and both class models
///
/// Edits (rectangle, seeds) are applied between iterations; each
/// [`run_iteration`](Self::run_iteration) either completes entirely or leaves
/// the session as it was.
pub struct GrabCutSession {
    image: RgbImage,
    config: GrabCutConfig,
    backend: Box<dyn MinCutBackend>,
    matte: Matte,
    rect: Option<Rect>,
    state: SessionState,
    dirty: bool,
    models: Option<ClassModels>,
    populations: Option<Populations>,
}

impl GrabCutSession {
    /// Create a session on `image` using the default Dinic backend
    pub fn new(image: RgbImage, config: GrabCutConfig) -> Result<Self> {
        Self::with_backend(image, config, Box::new(DinicBackend))
    }

    pub fn with_backend(
        image: RgbImage,
        config: GrabCutConfig,
        backend: Box<dyn MinCutBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let (width, height) = image.dimensions();
        tracing::info!(
            "Creating segmentation session for {}x{} image ({} components, backend {})",
            width,
            height,
            config.components,
            backend.name()
        );
        Ok(Self {
            matte: Matte::new(width, height),
            image,
            config,
            backend,
            rect: None,
            state: SessionState::Uninitialized,
            dirty: false,
            models: None,
            populations: None,
        })
    }

    /// Create a session and commit its bounding rectangle in one step
    pub fn initialize(image: RgbImage, rect: Rect, config: GrabCutConfig) -> Result<Self> {
        let mut session = Self::new(image, config)?;
        session.set_rect(rect)?;
        Ok(session)
    }

    /// Commit the bounding rectangle: its interior becomes probable foreground
    pub fn set_rect(&mut self, rect: Rect) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(SegmentationError::RectAlreadyCommitted);
        }
        let (width, height) = self.image.dimensions();
        let (x0, y0, x1, y1) = rect.clip(width, height).ok_or(SegmentationError::InvalidRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        })?;

        for y in y0..y1 {
            for x in x0..x1 {
                self.matte.set(x, y, MatteLabel::ProbableForeground)?;
            }
        }
        self.rect = Some(rect);
        self.state = SessionState::RectCommitted;
        tracing::info!(
            "Committed rectangle {},{} {}x{} ({} probable foreground pixels)",
            x0,
            y0,
            x1 - x0,
            y1 - y0,
            (x1 - x0) as usize * (y1 - y0) as usize
        );
        Ok(())
    }

    /// Pin one pixel to a class as a hard constraint
    pub fn add_seed(&mut self, x: u32, y: u32, class: PixelClass) -> Result<()> {
        if self.state == SessionState::Uninitialized {
            return Err(SegmentationError::NotInitialized);
        }
        self.matte.set(x, y, MatteLabel::definite(class))?;
        self.mark_seeded();
        Ok(())
    }

    /// Pin every pixel within `radius` of `(x, y)` to a class.
    ///
    /// The disc is clipped to the image; the center itself must be inside.
    /// Returns the number of pixels painted.
    pub fn add_stroke(&mut self, x: u32, y: u32, radius: u32, class: PixelClass) -> Result<usize> {
        if self.state == SessionState::Uninitialized {
            return Err(SegmentationError::NotInitialized);
        }
        let (width, height) = self.image.dimensions();
        if x >= width || y >= height {
            return Err(SegmentationError::OutOfBounds {
                x,
                y,
                width,
                height,
            });
        }

        let label = MatteLabel::definite(class);
        let radius_sq = u64::from(radius) * u64::from(radius);
        let (x0, x1) = (x.saturating_sub(radius), x.saturating_add(radius).min(width - 1));
        let (y0, y1) = (y.saturating_sub(radius), y.saturating_add(radius).min(height - 1));
        let mut painted = 0;
        for py in y0..=y1 {
            let dy = u64::from(py.abs_diff(y));
            for px in x0..=x1 {
                let dx = u64::from(px.abs_diff(x));
                if (dx * dx).saturating_add(dy * dy) > radius_sq {
                    continue;
                }
                self.matte.set(px, py, label)?;
                painted += 1;
            }
        }
        self.mark_seeded();
        tracing::debug!(x, y, radius, %class, painted, "applied seed stroke");
        Ok(painted)
    }

    fn mark_seeded(&mut self) {
        if matches!(self.state, SessionState::Iterating(_)) {
            self.dirty = true;
        }
    }

    /// Run one full assign / learn / cut / update cycle
    pub fn run_iteration(&mut self) -> Result<IterationReport> {
        let iteration = match self.state {
            SessionState::Uninitialized => return Err(SegmentationError::NotInitialized),
            SessionState::RectCommitted => 1,
            SessionState::Iterating(done) => done + 1,
        };
        let _span = tracing::info_span!("iteration", iteration).entered();

        // Work on copies so a failed solve leaves the session untouched.
        let (populations, mut models) = match (&self.models, &self.populations) {
            (Some(models), Some(populations)) if !self.dirty => {
                (Cow::Borrowed(populations), models.clone())
            }
            (Some(models), _) => {
                tracing::debug!("matte membership changed, refreshing populations");
                let populations = Populations::collect(&self.image, &self.matte);
                (Cow::Owned(populations), models.clone())
            }
            (None, _) => {
                let populations = Populations::collect(&self.image, &self.matte);
                populations.ensure_non_empty()?;
                let models = self.initial_models(&populations)?;
                (Cow::Owned(populations), models)
            }
        };

        refit(&mut models.background, &populations.background)?;
        refit(&mut models.foreground, &populations.foreground)?;

        let energy = build_energy(
            &self.image,
            &self.matte,
            &models.background,
            &models.foreground,
            &self.config,
        );
        let cut = solve_energy(self.backend.as_ref(), &energy)?;

        // Commit.
        let mut changed = 0;
        for (label, side) in self.matte.as_slice_mut().iter_mut().zip(&cut.sides) {
            if label.is_definite() {
                continue;
            }
            let class = match side {
                TerminalSide::Background => PixelClass::Background,
                TerminalSide::Foreground => PixelClass::Foreground,
            };
            if label.class() != class {
                changed += 1;
            }
            *label = MatteLabel::probable(class);
        }

        if let Cow::Owned(populations) = populations {
            self.populations = Some(populations);
        }
        self.models = Some(models);
        self.dirty = changed > 0;
        self.state = SessionState::Iterating(iteration);

        let report = IterationReport {
            iteration,
            flow: cut.flow,
            foreground: self.matte.count_class(PixelClass::Foreground),
            changed,
        };
        tracing::info!(
            "Iteration {}: beta={:.6}, flow={:.3}, foreground={}, changed={}",
            report.iteration,
            energy.beta,
            report.flow,
            report.foreground,
            report.changed
        );
        Ok(report)
    }

    fn initial_models(&self, populations: &Populations) -> Result<ClassModels> {
        let k = self.config.components;
        let mut background = GaussianMixture::new(PixelClass::Background, k)?;
        let mut foreground = GaussianMixture::new(PixelClass::Foreground, k)?;
        background.initialize_components(populations.background.colors())?;
        foreground.initialize_components(populations.foreground.colors())?;
        Ok(ClassModels {
            background,
            foreground,
        })
    }

    /// Run `count` iterations, stopping at the first failure
    pub fn run(&mut self, count: usize) -> Result<Vec<IterationReport>> {
        (0..count).map(|_| self.run_iteration()).collect()
    }

    /// Read view of the matte for rendering
    pub fn current_matte(&self) -> &Matte {
        &self.matte
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn config(&self) -> &GrabCutConfig {
        &self.config
    }

    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn background_model(&self) -> Option<&GaussianMixture> {
        self.models.as_ref().map(|m| &m.background)
    }

    pub fn foreground_model(&self) -> Option<&GaussianMixture> {
        self.models.as_ref().map(|m| &m.foreground)
    }

    /// Drop rectangle, seeds, and models; the image and config are kept
    pub fn reset(&mut self) {
        tracing::info!("Resetting segmentation session");
        self.matte = Matte::new(self.image.width(), self.image.height());
        self.rect = None;
        self.state = SessionState::Uninitialized;
        self.dirty = false;
        self.models = None;
        self.populations = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;
    use crate::mincut::MinCutGraph;
    use image::Rgb;

    fn patch_image() -> RgbImage {
        RgbImage::from_fn(16, 12, |x, y| {
            if (5..11).contains(&x) && (4..8).contains(&y) {
                Rgb([220, 40, 40])
            } else {
                Rgb([30, 30, 120])
            }
        })
    }

    struct FailingBackend;

    impl MinCutBackend for FailingBackend {
        fn create_graph(
            &self,
            node_bound: usize,
            _edge_bound: usize,
        ) -> std::result::Result<Box<dyn MinCutGraph>, SolverError> {
            Err(SolverError::Allocation(node_bound))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn iteration_requires_rectangle() {
        let mut session = GrabCutSession::new(patch_image(), GrabCutConfig::default()).unwrap();
        assert!(matches!(
            session.run_iteration(),
            Err(SegmentationError::NotInitialized)
        ));
        assert!(matches!(
            session.add_seed(0, 0, PixelClass::Foreground),
            Err(SegmentationError::NotInitialized)
        ));
    }

    #[test]
    fn rectangle_is_committed_once() {
        let mut session =
            GrabCutSession::initialize(patch_image(), Rect::new(2, 2, 4, 3), GrabCutConfig::default())
                .unwrap();
        assert_eq!(session.state(), SessionState::RectCommitted);
        assert_eq!(session.current_matte().count(MatteLabel::ProbableForeground), 12);
        assert!(matches!(
            session.set_rect(Rect::new(0, 0, 2, 2)),
            Err(SegmentationError::RectAlreadyCommitted)
        ));
    }

    #[test]
    fn rectangle_outside_image_is_invalid() {
        let result =
            GrabCutSession::initialize(patch_image(), Rect::new(40, 40, 3, 3), GrabCutConfig::default());
        assert!(matches!(result, Err(SegmentationError::InvalidRect { .. })));
    }

    #[test]
    fn full_image_rectangle_leaves_background_empty() {
        let mut session =
            GrabCutSession::initialize(patch_image(), Rect::new(0, 0, 16, 12), GrabCutConfig::default())
                .unwrap();
        assert!(matches!(
            session.run_iteration(),
            Err(SegmentationError::EmptyPopulation(PixelClass::Background))
        ));
        assert_eq!(session.state(), SessionState::RectCommitted);
    }

    #[test]
    fn failed_solve_leaves_session_untouched() {
        let mut session = GrabCutSession::with_backend(
            patch_image(),
            GrabCutConfig::default(),
            Box::new(FailingBackend),
        )
        .unwrap();
        session.set_rect(Rect::new(3, 2, 10, 8)).unwrap();
        let before = session.current_matte().clone();

        assert!(matches!(
            session.run_iteration(),
            Err(SegmentationError::Solver(SolverError::Allocation(_)))
        ));
        assert_eq!(session.current_matte(), &before);
        assert_eq!(session.state(), SessionState::RectCommitted);
        assert!(session.background_model().is_none());
    }

    #[test]
    fn seeds_after_first_iteration_mark_dirty() {
        let mut session =
            GrabCutSession::initialize(patch_image(), Rect::new(3, 2, 10, 8), GrabCutConfig::default())
                .unwrap();
        session.add_seed(4, 3, PixelClass::Background).unwrap();
        assert!(!session.is_dirty());

        session.run_iteration().unwrap();
        session.run_iteration().unwrap();
        session.add_seed(7, 5, PixelClass::Foreground).unwrap();
        assert!(session.is_dirty());
        session.run_iteration().unwrap();
        assert_eq!(session.state(), SessionState::Iterating(3));
    }

    #[test]
    fn stroke_is_clipped_to_image() {
        let mut session =
            GrabCutSession::initialize(patch_image(), Rect::new(3, 2, 10, 8), GrabCutConfig::default())
                .unwrap();
        // Radius 1 disc has 5 cells; at the corner only 3 remain.
        let painted = session.add_stroke(0, 0, 1, PixelClass::Foreground).unwrap();
        assert_eq!(painted, 3);
        assert_eq!(
            session.current_matte().get(1, 0),
            Some(MatteLabel::DefiniteForeground)
        );
        assert!(session.add_stroke(16, 0, 2, PixelClass::Foreground).is_err());
    }

    #[test]
    fn oversized_stroke_covers_the_image() {
        let mut session =
            GrabCutSession::initialize(patch_image(), Rect::new(3, 2, 10, 8), GrabCutConfig::default())
                .unwrap();
        let painted = session
            .add_stroke(5, 5, u32::MAX, PixelClass::Foreground)
            .unwrap();
        assert_eq!(painted, 16 * 12);
        assert_eq!(
            session.current_matte().count(MatteLabel::DefiniteForeground),
            16 * 12
        );

        let painted = session.add_stroke(15, 11, 0, PixelClass::Background).unwrap();
        assert_eq!(painted, 1);
        assert_eq!(
            session.current_matte().get(15, 11),
            Some(MatteLabel::DefiniteBackground)
        );
    }

    #[test]
    fn emptied_foreground_does_not_stall_iterations() {
        let flat = RgbImage::from_pixel(20, 16, Rgb([120, 120, 120]));
        let mut session =
            GrabCutSession::initialize(flat, Rect::new(4, 4, 12, 8), GrabCutConfig::default())
                .unwrap();
        session.run_iteration().unwrap();
        assert_eq!(session.current_matte().count_class(PixelClass::Foreground), 0);
        let model = session.foreground_model().unwrap().clone();

        session.run_iteration().unwrap();
        session.run_iteration().unwrap();
        assert_eq!(session.state(), SessionState::Iterating(3));
        assert_eq!(session.foreground_model(), Some(&model));
    }

    #[test]
    fn reset_returns_to_uninitialized() {
        let mut session =
            GrabCutSession::initialize(patch_image(), Rect::new(3, 2, 10, 8), GrabCutConfig::default())
                .unwrap();
        session.run_iteration().unwrap();
        session.reset();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.rect().is_none());
        assert!(session.foreground_model().is_none());
        assert_eq!(
            session.current_matte().count(MatteLabel::DefiniteBackground),
            16 * 12
        );
    }
}
