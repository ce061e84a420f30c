use crate::config::{ChannelConfig, EngineConfig};
use crate::error::Result;
use crate::pipeline::{RenderPipeline, RenderRequest, RenderResult};
use crate::range::ViewRange;
use crate::selector::Mode;
use crate::store::SignalSource;
use crate::worker::RenderWorker;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, prelude::*};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Zoom step for +/- and ctrl+scroll
const ZOOM_STEP: f64 = 2.0;
/// Fraction of the view moved by h/l and scrolling
const PAN_STEP: f64 = 0.1;
/// Fraction of the view moved by H/L and PageUp/PageDown
const PAN_STEP_BIG: f64 = 0.25;
/// Braille markers give two dots per terminal cell horizontally
const POINTS_PER_CELL: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlotLayout {
    /// All active channels share one chart
    Combined,
    /// One chart per active channel, stacked vertically
    Stacked,
}

pub struct App<S: SignalSource + 'static> {
    pipeline: Arc<RenderPipeline<S>>,
    worker: RenderWorker,
    pub(super) config: ChannelConfig,
    pub(super) title: String,
    pub(super) view: ViewRange,
    pub(super) active: Vec<bool>,
    pub(super) layout: PlotLayout,
    /// Last completed render; stays on screen while a newer one is computed
    pub(super) latest: Option<RenderResult>,
    pub(super) status: Option<String>,
    /// Shown whenever the latest render has nothing more pressing to report
    warning: Option<String>,
    pub(super) last_render_time: Option<Duration>,
    submitted: Option<RenderRequest>,
    submitted_at: Option<Instant>,
    plot_width: usize,
    running: bool,
}

impl<S: SignalSource + 'static> App<S> {
    pub fn new(source: S, title: String, config: ChannelConfig, engine: EngineConfig) -> Self {
        let pipeline = Arc::new(RenderPipeline::new(Arc::new(source), engine));
        let worker = RenderWorker::spawn(Arc::clone(&pipeline));
        let channels = pipeline.source().channel_count();
        let view = ViewRange::full(pipeline.sample_count());

        App {
            pipeline,
            worker,
            config,
            title,
            view,
            active: vec![true; channels],
            layout: PlotLayout::Combined,
            latest: None,
            status: None,
            warning: None,
            last_render_time: None,
            submitted: None,
            submitted_at: None,
            plot_width: 0,
            running: true,
        }
    }

    /// Keep `warning` on the status line for the whole session.
    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.status = warning.clone();
        self.warning = warning;
        self
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        self.worker.cancel();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        while self.running {
            // Drawing measures the plot, which sets the point budget.
            terminal.draw(|frame| super::ui::render(frame, self))?;

            self.sync_request();
            if let Some(result) = self.worker.poll() {
                self.accept(result);
            }

            let poll_duration = if self.is_rendering() {
                Duration::from_millis(15)
            } else {
                Duration::from_millis(80)
            };

            if event::poll(poll_duration)? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind == KeyEventKind::Press {
                            self.handle_key(key.code, key.modifiers);
                        }
                    }
                    Event::Mouse(mouse) => {
                        let ctrl = mouse.modifiers.contains(KeyModifiers::CONTROL);
                        match mouse.kind {
                            MouseEventKind::ScrollUp if ctrl => self.zoom(1.0 / ZOOM_STEP),
                            MouseEventKind::ScrollDown if ctrl => self.zoom(ZOOM_STEP),
                            MouseEventKind::ScrollUp => self.pan(-PAN_STEP),
                            MouseEventKind::ScrollDown => self.pan(PAN_STEP),
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    pub(super) fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);

        match key {
            KeyCode::Char('c') if ctrl => self.running = false,
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,

            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Char('i') => {
                self.zoom(1.0 / ZOOM_STEP)
            }
            KeyCode::Char('-') | KeyCode::Char('o') => self.zoom(ZOOM_STEP),

            KeyCode::Char('h') | KeyCode::Left => self.pan(-PAN_STEP),
            KeyCode::Char('l') | KeyCode::Right => self.pan(PAN_STEP),
            KeyCode::Char('H') | KeyCode::PageUp => self.pan(-PAN_STEP_BIG),
            KeyCode::Char('L') | KeyCode::PageDown => self.pan(PAN_STEP_BIG),
            KeyCode::Home | KeyCode::Char('g') => {
                self.view = self.view.panned(i64::MIN / 2, self.samples());
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.view = self.view.panned(i64::MAX / 2, self.samples());
            }
            KeyCode::Char('0') => self.view = ViewRange::full(self.samples()),

            KeyCode::Char(c @ '1'..='9') => {
                let channel = c as usize - '1' as usize;
                if let Some(on) = self.active.get_mut(channel) {
                    *on = !*on;
                }
            }
            KeyCode::Char('a') => self.active.iter_mut().for_each(|on| *on = true),
            KeyCode::Char('e') => {
                self.layout = match self.layout {
                    PlotLayout::Combined => PlotLayout::Stacked,
                    PlotLayout::Stacked => PlotLayout::Combined,
                };
            }
            _ => {}
        }
    }

    fn zoom(&mut self, factor: f64) {
        self.view = self.view.zoomed(factor, self.samples());
    }

    fn pan(&mut self, fraction: f64) {
        let delta = (self.view.len() as f64 * fraction).round() as i64;
        // Always move at least one sample so narrow views can still pan.
        let delta = if delta == 0 { fraction.signum() as i64 } else { delta };
        self.view = self.view.panned(delta, self.samples());
    }

    /// Submit a render when what is on screen no longer matches the view.
    fn sync_request(&mut self) {
        if self.plot_width == 0 {
            return;
        }
        let request = RenderRequest::for_range(
            self.view,
            self.active_channels(),
            self.plot_width * POINTS_PER_CELL,
        );
        if self.submitted.as_ref() == Some(&request) {
            return;
        }
        log::debug!(
            "submitting render {} for {} channel(s), budget {}",
            self.view,
            request.channels.len(),
            request.point_budget
        );
        self.worker.submit(request.clone());
        self.submitted = Some(request);
        self.submitted_at = Some(Instant::now());
    }

    fn accept(&mut self, result: Result<RenderResult>) {
        self.last_render_time = self.submitted_at.take().map(|t| t.elapsed());
        match result {
            Ok(render) => {
                self.status = render
                    .failures()
                    .next()
                    .map(|(channel, e)| format!("{}: {}", self.config.name(channel), e))
                    .or_else(|| render.diagnostics.first().map(|d| d.to_string()))
                    .or_else(|| self.warning.clone());
                self.latest = Some(render);
            }
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    pub(super) fn set_plot_width(&mut self, cells: usize) {
        self.plot_width = cells;
    }

    pub(super) fn is_rendering(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub(super) fn samples(&self) -> usize {
        self.pipeline.sample_count()
    }

    pub(super) fn active_channels(&self) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(ch, on)| on.then_some(ch))
            .collect()
    }

    /// Summary of how the latest frame was produced, e.g. "min/max x512"
    pub(super) fn mode_label(&self) -> Option<String> {
        let render = self.latest.as_ref()?.renders().next()?;
        Some(match (render.mode, render.bucket_width) {
            (Mode::Full, _) => "raw".to_string(),
            (Mode::Reduced, Some(w)) => format!("min/max x{}", w),
            (Mode::Reduced, None) => "min/max".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySignal;

    fn app(samples: usize) -> App<MemorySignal> {
        let ch: Vec<i32> = (0..samples).map(|i| (i % 200) as i32).collect();
        let source = MemorySignal::from_channels(vec![ch.clone(), ch.clone(), ch.clone(), ch]);
        App::new(
            source,
            "test.bsr".to_string(),
            ChannelConfig::default(),
            EngineConfig::default(),
        )
    }

    #[test]
    fn test_zoom_and_pan_stay_in_bounds() {
        let mut app = app(100_000);
        app.handle_key(KeyCode::Char('+'), KeyModifiers::NONE);
        assert_eq!(app.view.len(), 50_000);
        assert_eq!(app.view.start(), 25_000);

        app.handle_key(KeyCode::Char('L'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('L'), KeyModifiers::NONE);
        assert_eq!(app.view.end(), 100_000);
        assert_eq!(app.view.len(), 50_000);

        app.handle_key(KeyCode::Home, KeyModifiers::NONE);
        assert_eq!(app.view.start(), 0);

        app.handle_key(KeyCode::Char('0'), KeyModifiers::NONE);
        assert_eq!(app.view, ViewRange::full(100_000));
    }

    #[test]
    fn test_channel_toggles() {
        let mut app = app(1000);
        app.handle_key(KeyCode::Char('2'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('4'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('9'), KeyModifiers::NONE);
        assert_eq!(app.active_channels(), vec![0, 2]);
        app.handle_key(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(app.active_channels(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_open_warning_stays_on_status_line() {
        let mut app = app(50_000).with_warning(Some("4 trailing bytes dropped".to_string()));
        assert_eq!(app.status.as_deref(), Some("4 trailing bytes dropped"));

        app.set_plot_width(100);
        app.sync_request();
        let result = app.worker.wait(Duration::from_secs(10)).unwrap();
        app.accept(result);
        assert!(app.latest.is_some());
        assert_eq!(app.status.as_deref(), Some("4 trailing bytes dropped"));
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app(10);
        app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(!app.running);
    }

    #[test]
    fn test_request_tracks_view_and_width() {
        let mut app = app(50_000);
        app.sync_request();
        assert!(app.submitted.is_none());

        app.set_plot_width(100);
        app.sync_request();
        let first = app.submitted.clone().unwrap();
        assert_eq!(first.point_budget, 200);

        app.sync_request();
        assert_eq!(app.submitted.as_ref(), Some(&first));

        app.handle_key(KeyCode::Char('1'), KeyModifiers::NONE);
        app.sync_request();
        let second = app.submitted.clone().unwrap();
        assert!(!second.channels.contains(&0));

        let result = app.worker.wait(Duration::from_secs(10)).unwrap();
        app.accept(result);
        let latest = app.latest.as_ref().unwrap();
        assert!(latest.get(0).is_none());
        assert_eq!(app.mode_label().as_deref(), Some("min/max x250"));
        assert!(!app.is_rendering());
    }
}
