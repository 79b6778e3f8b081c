//! Mode orchestration: which allocation strategy is active for a surface.
//!
//! The controller owns whatever the active strategy holds and guarantees the
//! release-before-reallocate discipline: no transition starts negotiating
//! until the previous mode's cells are back in the pool. It also owns the
//! downstream rendering hint: the standard cube is typically much coarser
//! than an image-specific palette, so crossing into or out of cube mode
//! flips the "dither the preview" flag and asks the renderer to regenerate.

use serde::{Deserialize, Serialize};

use crate::client::{ResourceClient, SurfaceId, VisualClass, VisualError, VisualInfo};
use crate::color::Rgb;
use crate::cube::{CubeDensity, StandardCube, StandardCubeBuilder};
use crate::direct::DirectColorMapper;
use crate::error::AllocError;
use crate::progress::ProgressSink;
use crate::session::{AllocPolicy, AllocReport, AllocationSession};

/// The allocation strategies a surface can run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Read-only cells from the global pool; degrade under scarcity.
    Shared,
    /// Read-only cells, escalating to a private pool when the global pool
    /// runs dry.
    Private,
    /// Read-write cells for live palette editing, escalating like
    /// [`Mode::Private`].
    SharedWritable,
    /// One shared sampling cube for every surface.
    StandardCube,
    /// Pure bit arithmetic on a true/direct-color display.
    Direct,
}

impl Mode {
    /// Whether previews should dither under this mode's palette.
    #[inline]
    pub fn uses_dithering(self) -> bool {
        matches!(self, Mode::StandardCube)
    }
}

/// Receives regenerate requests when a transition changes the palette shape.
pub trait PreviewSink {
    /// `dithering` is the new rendering-quality recommendation.
    fn regenerate(&mut self, dithering: bool);
}

/// Discards every regenerate request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPreview;

impl PreviewSink for NoPreview {
    fn regenerate(&mut self, _dithering: bool) {}
}

/// Inputs for one mode transition.
///
/// # Example
///
/// ```
/// use cellmap::{ModeRequest, Rgb};
///
/// let colors = [Rgb::BLACK, Rgb::WHITE];
/// let request = ModeRequest::new(&colors).standard_cube(true);
/// assert!(request.standard_cube);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ModeRequest<'a> {
    /// Desired palette for the session modes; ignored by cube and direct
    /// modes.
    pub desired: &'a [Rgb],
    /// Linked-cell group ids, one per color; 0 means ungrouped.
    pub groups: Option<&'a [u16]>,
    /// Allocation priority order; index order when `None`.
    pub order: Option<&'a [usize]>,
    /// Explicit cube density; chosen from the display when `None`.
    pub cube_density: Option<CubeDensity>,
    /// Distinct free slots the caller believes the pool has; defaults to
    /// the display's colormap length. Only used to downgrade the cube.
    pub available_slots: Option<usize>,
    /// Request the 128-entry "standard cube" density.
    pub standard_cube: bool,
    /// The caller already released the current holdings out-of-band; skip
    /// the release step and just drop the ledger.
    pub already_released: bool,
}

impl<'a> ModeRequest<'a> {
    pub fn new(desired: &'a [Rgb]) -> Self {
        Self {
            desired,
            groups: None,
            order: None,
            cube_density: None,
            available_slots: None,
            standard_cube: false,
            already_released: false,
        }
    }

    #[inline]
    pub fn groups(mut self, groups: &'a [u16]) -> Self {
        self.groups = Some(groups);
        self
    }

    #[inline]
    pub fn order(mut self, order: &'a [usize]) -> Self {
        self.order = Some(order);
        self
    }

    #[inline]
    pub fn cube_density(mut self, density: CubeDensity) -> Self {
        self.cube_density = Some(density);
        self
    }

    #[inline]
    pub fn available_slots(mut self, slots: usize) -> Self {
        self.available_slots = Some(slots);
        self
    }

    #[inline]
    pub fn standard_cube(mut self, standard: bool) -> Self {
        self.standard_cube = standard;
        self
    }

    #[inline]
    pub fn already_released(mut self, released: bool) -> Self {
        self.already_released = released;
        self
    }
}

/// What a completed transition produced.
#[derive(Debug)]
pub struct ModeChange {
    pub mode: Mode,
    /// The new rendering-quality recommendation.
    pub dithering: bool,
    /// The negotiation report, absent for [`Mode::Direct`].
    pub report: Option<AllocReport>,
}

/// Drives transitions between allocation strategies for one surface.
pub struct ModeController {
    visual: VisualInfo,
    surface: SurfaceId,
    mode: Option<Mode>,
    session: Option<AllocationSession>,
    cube: StandardCubeBuilder,
    direct: Option<DirectColorMapper>,
}

impl ModeController {
    pub fn new(visual: VisualInfo, surface: SurfaceId) -> Self {
        Self {
            visual,
            surface,
            mode: None,
            session: None,
            cube: StandardCubeBuilder::new(surface),
            direct: None,
        }
    }

    /// The mode applied last, if any.
    #[inline]
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// The session backing a `Shared`/`Private`/`SharedWritable` mode.
    #[inline]
    pub fn session(&self) -> Option<&AllocationSession> {
        self.session.as_ref()
    }

    /// Mutable access for recoloring under `SharedWritable`.
    #[inline]
    pub fn session_mut(&mut self) -> Option<&mut AllocationSession> {
        self.session.as_mut()
    }

    /// The standard cube, once built.
    #[inline]
    pub fn cube(&self) -> Option<&StandardCube> {
        self.cube.current()
    }

    /// The direct mapper backing `Direct` mode.
    #[inline]
    pub fn direct_mapper(&self) -> Option<&DirectColorMapper> {
        self.direct.as_ref()
    }

    /// The current rendering-quality recommendation.
    #[inline]
    pub fn dithering_recommended(&self) -> bool {
        self.mode.is_some_and(Mode::uses_dithering)
    }

    /// Transition to `mode`: release the current mode's holdings, negotiate
    /// (or compute) the new palette, and signal the renderer when the
    /// transition crosses the cube boundary.
    ///
    /// The standard cube itself survives transitions: it is shared by
    /// every open surface and rebuilding it flashes them all, and is torn
    /// down only by [`shutdown`](Self::shutdown).
    pub fn apply<C: ResourceClient>(
        &mut self,
        client: &mut C,
        mode: Mode,
        request: &ModeRequest<'_>,
        progress: &mut dyn ProgressSink,
        preview: &mut dyn PreviewSink,
    ) -> Result<ModeChange, AllocError> {
        if request.already_released {
            self.forget_session();
        } else {
            self.release_session(client);
        }
        self.direct = None;

        let report = match mode {
            Mode::Direct => {
                self.direct = Some(DirectColorMapper::new(&self.visual)?);
                None
            }
            Mode::StandardCube => Some(self.build_cube(client, request, progress)?),
            Mode::Shared => {
                Some(self.allocate_session(client, AllocPolicy::new(), request, progress)?)
            }
            Mode::Private => Some(self.allocate_session(
                client,
                AllocPolicy::new().allow_private_pool(true),
                request,
                progress,
            )?),
            Mode::SharedWritable => Some(self.allocate_session(
                client,
                AllocPolicy::new().writable(true).allow_private_pool(true),
                request,
                progress,
            )?),
        };

        let previous = self.mode.replace(mode);
        let dithering = mode.uses_dithering();
        let crossed_cube_boundary = previous.map(Mode::uses_dithering) != Some(dithering);
        if crossed_cube_boundary {
            preview.regenerate(dithering);
        }
        tracing::info!(?mode, ?previous, dithering, "display mode applied");
        Ok(ModeChange {
            mode,
            dithering,
            report,
        })
    }

    /// Release the active session's holdings without changing mode.
    pub fn release<C: ResourceClient>(&mut self, client: &mut C) {
        self.release_session(client);
    }

    /// Release everything, the shared cube included. For process shutdown.
    pub fn shutdown<C: ResourceClient>(&mut self, client: &mut C) {
        self.release_session(client);
        self.cube.release(client);
        self.direct = None;
        self.mode = None;
    }

    fn allocate_session<C: ResourceClient>(
        &mut self,
        client: &mut C,
        policy: AllocPolicy,
        request: &ModeRequest<'_>,
        progress: &mut dyn ProgressSink,
    ) -> Result<AllocReport, AllocError> {
        if !matches!(self.visual.class, VisualClass::Indexed) {
            return Err(VisualError::NotIndexedClass.into());
        }
        let mut session = AllocationSession::new(self.surface, policy, request.desired);
        if let Some(groups) = request.groups {
            session = session.with_groups(groups);
        }
        let report = session.allocate(client, request.order, progress)?;
        self.session = Some(session);
        Ok(report)
    }

    fn build_cube<C: ResourceClient>(
        &mut self,
        client: &mut C,
        request: &ModeRequest<'_>,
        progress: &mut dyn ProgressSink,
    ) -> Result<AllocReport, AllocError> {
        if self.visual.class.is_direct() {
            let mapper = DirectColorMapper::new(&self.visual)?;
            let cube = self.cube.ensure_direct(&mapper);
            return Ok(cube.report().clone());
        }
        let density = request.cube_density.unwrap_or_else(|| {
            CubeDensity::choose(
                &self.visual,
                request.standard_cube,
                request.available_slots.unwrap_or(self.visual.colormap_len),
            )
        });
        let cube = self.cube.ensure(client, density, progress)?;
        Ok(cube.report().clone())
    }

    fn release_session<C: ResourceClient>(&mut self, client: &mut C) {
        if let Some(mut session) = self.session.take() {
            session.release(client);
        }
    }

    fn forget_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.forget();
        }
    }
}
