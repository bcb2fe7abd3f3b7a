use fretseq_grid::{MEASURE_LENGTH, STRING_COUNT};

/// Width of one beat at zoom 1.
pub const BEAT_WIDTH_PX: f64 = 72.0;
pub const ROW_HEIGHT_PX: f64 = 48.0;
/// String-label column on the left of the grid.
pub const GUTTER_PX: f64 = 36.0;
/// Distance from the viewport edge at which the play-head triggers a scroll.
pub const AUTOSCROLL_BUFFER_PX: f64 = 40.0;
/// Measures jumped per auto-scroll step.
pub const AUTOSCROLL_MEASURES: u32 = 4;

/// Pointer position in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A grid cell under the pointer. `beat` and `row` may be out of range; `valid`
/// says whether the cell can take a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellHit {
    pub beat: i64,
    /// 0 = top string (high e).
    pub row: i64,
    pub valid: bool,
}

impl CellHit {
    /// Beat and 1-based string, when the cell lies on the grid.
    pub fn cell(&self) -> Option<(u32, u8)> {
        if !self.valid {
            return None;
        }
        Some((u32::try_from(self.beat).ok()?, u8::try_from(self.row + 1).ok()?))
    }
}

/// Where the note grid sits on the page. The renderer owns scrolling and zoom
/// and keeps this up to date; every drag entry point maps pointers through it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridViewport {
    /// Page position of the scroll box's top-left corner.
    pub left: f64,
    pub top: f64,
    pub scroll_left: f64,
    pub zoom: f64,
}

impl Default for GridViewport {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scroll_left: 0.0,
            zoom: crate::settings::ZOOM_BASE,
        }
    }
}

impl GridViewport {
    pub fn beat_width(&self) -> f64 {
        BEAT_WIDTH_PX * self.zoom
    }

    pub fn content_width(&self, timeline_len: u32) -> f64 {
        f64::from(timeline_len) * self.beat_width()
    }

    /// Map a page point to `{beat, row, valid}`.
    pub fn cell_at(&self, point: Point, timeline_len: u32) -> CellHit {
        let rel_x = point.x - self.left - GUTTER_PX + self.scroll_left;
        let rel_y = point.y - self.top;

        let beat = (rel_x / self.beat_width()).floor() as i64;
        let row = (rel_y / ROW_HEIGHT_PX).floor() as i64;

        let valid = rel_x >= 0.0
            && rel_y >= 0.0
            && beat >= 0
            && beat < i64::from(timeline_len)
            && row >= 0
            && row < i64::from(STRING_COUNT);

        CellHit { beat, row, valid }
    }

    /// Page position of a cell's top-left corner; inverse of [`cell_at`].
    ///
    /// [`cell_at`]: GridViewport::cell_at
    pub fn cell_origin(&self, beat: u32, row: u8) -> Point {
        Point::new(
            self.left + GUTTER_PX - self.scroll_left + f64::from(beat) * self.beat_width(),
            self.top + f64::from(row) * ROW_HEIGHT_PX,
        )
    }

    /// Content x of the play-head. Progress spans `[start_beat, timeline_len)`.
    pub fn playhead_x(&self, progress: f64, start_beat: u32, timeline_len: u32) -> f64 {
        let span = f64::from(timeline_len.saturating_sub(start_beat));
        (f64::from(start_beat) + progress * span) * self.beat_width()
    }

    /// New scroll offset that keeps the play-head in view, or `None` when it
    /// is already comfortably inside.
    pub fn autoscroll(&self, playhead_x: f64, view_width: f64, timeline_len: u32) -> Option<f64> {
        autoscroll(
            playhead_x,
            self.scroll_left,
            view_width,
            self.content_width(timeline_len),
            self.beat_width() * f64::from(MEASURE_LENGTH),
        )
    }
}

/// Jump by whole measures once the play-head gets within
/// [`AUTOSCROLL_BUFFER_PX`] of either edge.
pub fn autoscroll(
    playhead_x: f64,
    scroll_left: f64,
    view_width: f64,
    content_width: f64,
    measure_px: f64,
) -> Option<f64> {
    let jump = measure_px * f64::from(AUTOSCROLL_MEASURES);

    if playhead_x > scroll_left + view_width - AUTOSCROLL_BUFFER_PX {
        let max = (content_width - view_width).max(0.0);
        let next = (scroll_left + jump).min(max);
        return (next != scroll_left).then_some(next);
    }
    if playhead_x < scroll_left + AUTOSCROLL_BUFFER_PX {
        let next = (scroll_left - jump).max(0.0);
        return (next != scroll_left).then_some(next);
    }
    None
}
