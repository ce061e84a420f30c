use super::app::{App, PlotLayout};
use crate::commands::format_time;
use crate::pipeline::{ChannelRender, RenderResult};
use crate::store::SignalSource;
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};

const CHANNEL_COLORS: [Color; 4] = [Color::Yellow, Color::Cyan, Color::Magenta, Color::Green];

/// Chart layout: borders(2) + y-axis labels(~8 for "-2147483") = ~10
const CHART_CHROME: u16 = 10;

fn channel_color(channel: usize) -> Color {
    CHANNEL_COLORS[channel % CHANNEL_COLORS.len()]
}

pub fn render<S: SignalSource + 'static>(frame: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(6),    // Plot
            Constraint::Length(1), // Footer
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_plot(frame, app, chunks[1]);
    render_footer(frame, app, chunks[2]);
}

fn render_header<S: SignalSource + 'static>(frame: &mut Frame, app: &App<S>, area: Rect) {
    let t0 = app.config.time_of(app.view.start());
    let t1 = app.config.time_of(app.view.end());

    let mut spans = vec![
        Span::styled(" bsrview ", Style::default().bg(Color::Blue).fg(Color::White)),
        Span::raw(format!(" {} ", app.title)),
        Span::styled(
            format!(
                "| {} samples | {} ",
                app.samples(),
                format_time(app.config.duration(app.samples()))
            ),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(format!(
            "| {} - {} ({}) ",
            format_time(t0),
            format_time(t1),
            format_time(t1 - t0)
        )),
    ];

    if let Some(mode) = app.mode_label() {
        spans.push(Span::styled(
            format!("[{}] ", mode),
            Style::default().fg(Color::Cyan),
        ));
    }
    if app.is_rendering() {
        spans.push(Span::styled(
            "rendering... ",
            Style::default().fg(Color::Yellow),
        ));
    } else if let Some(took) = app.last_render_time {
        spans.push(Span::styled(
            format!("{:.1}ms ", took.as_secs_f64() * 1e3),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(status) = &app.status {
        spans.push(Span::styled(
            status.clone(),
            Style::default().fg(Color::Red),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_plot<S: SignalSource + 'static>(frame: &mut Frame, app: &mut App<S>, area: Rect) {
    app.set_plot_width(area.width.saturating_sub(CHART_CHROME).max(1) as usize);

    let active = app.active_channels();
    if active.is_empty() {
        let msg = Paragraph::new(" No channels shown (1-9 toggles, a shows all)")
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, area);
        return;
    }

    let Some(latest) = app.latest.as_ref() else {
        let msg = Paragraph::new(" Rendering...")
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, area);
        return;
    };

    // Channels the user just switched off disappear immediately, even if
    // the result on screen still carries them.
    let shown: Vec<&ChannelRender> = latest
        .renders()
        .filter(|r| active.contains(&r.channel))
        .collect();

    match app.layout {
        PlotLayout::Combined => {
            let title = shown
                .iter()
                .map(|r| app.config.name(r.channel))
                .collect::<Vec<_>>()
                .join(", ");
            render_chart(frame, app, latest, &shown, title, area);
        }
        PlotLayout::Stacked => {
            if shown.is_empty() {
                render_chart(frame, app, latest, &shown, String::new(), area);
                return;
            }
            let rows = Layout::vertical(vec![Constraint::Ratio(1, shown.len() as u32); shown.len()])
                .split(area);
            for (render, row) in shown.iter().zip(rows.iter()) {
                let title = app.config.name(render.channel);
                render_chart(frame, app, latest, std::slice::from_ref(render), title, *row);
            }
        }
    }
}

fn render_chart<S: SignalSource + 'static>(
    frame: &mut Frame,
    app: &App<S>,
    latest: &RenderResult,
    renders: &[&ChannelRender],
    title: String,
    area: Rect,
) {
    let x_start = app.config.time_of(latest.range.start());
    let x_end = app.config.time_of(latest.range.end());

    let series: Vec<(usize, Vec<(f64, f64)>)> = renders
        .iter()
        .map(|r| {
            let data = r
                .points
                .iter()
                .map(|p| (app.config.time_of(p.index), p.value as f64))
                .collect();
            (r.channel, data)
        })
        .collect();

    let (y_min, y_max) = y_bounds(series.iter().flat_map(|(_, d)| d.iter().map(|(_, y)| *y)));

    let datasets: Vec<Dataset> = series
        .iter()
        .map(|(channel, data)| {
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(channel_color(*channel)))
                .data(data)
        })
        .collect();

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([x_start, x_end])
                .labels(generate_time_labels(x_start, x_end)),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::raw(format!("{:.0}", y_min)),
                    Span::raw(format!("{:.0}", (y_min + y_max) / 2.0)),
                    Span::raw(format!("{:.0}", y_max)),
                ]),
        );

    frame.render_widget(chart, area);
}

/// Bounds around the visible values with 5% headroom; never a zero-height axis.
fn y_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        return (-1.0, 1.0);
    }
    let span = (max - min).max(1.0);
    let padding = span * 0.05;
    ((min - padding).floor(), (max + padding).ceil())
}

/// X-axis labels: start, middle, end
fn generate_time_labels(start: f64, end: f64) -> Vec<Span<'static>> {
    let mid = (start + end) / 2.0;

    vec![
        Span::raw(format_time(start.max(0.0))),
        Span::raw(format_time(mid.max(0.0))),
        Span::raw(format_time(end)),
    ]
}

fn render_footer<S: SignalSource + 'static>(frame: &mut Frame, app: &App<S>, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().bg(Color::DarkGray));

    let mut spans = vec![
        key(" q "),
        Span::raw(" quit "),
        key(" h/l "),
        Span::raw(" pan "),
        key(" +/- "),
        Span::raw(" zoom "),
        key(" 0 "),
        Span::raw(" reset "),
        key(" e "),
        Span::raw(match app.layout {
            PlotLayout::Combined => " stack ",
            PlotLayout::Stacked => " combine ",
        }),
    ];

    // Channel toggles, coloured when shown
    for (channel, on) in app.active.iter().enumerate().take(9) {
        let style = if *on {
            Style::default().fg(channel_color(channel))
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(
            format!(" {}:{}", channel + 1, app.config.name(channel)),
            style,
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
