use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Gauge, Paragraph};

use super::slider::{Slider, draw_slider};
use crate::shared::{DisplayState, format_time};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];
const HELP: &str = "space play/pause  s stop  ←/→ seek  e export  q quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, now_playing: Option<String>, spinner: usize) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // title + now playing
            Constraint::Length(3), // position
            Constraint::Length(3), // rate
            Constraint::Length(3), // reverb volume
            Constraint::Length(3), // reverb length
            Constraint::Length(1), // status
            Constraint::Min(1),    // help
        ])
        .split(area);

    draw_header(frame, sections[0], state, now_playing);
    draw_position(frame, sections[1], state);
    draw_sliders(frame, &sections[2..5], state);
    draw_status(frame, sections[5], state, spinner);
    frame.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        sections[6],
    );
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState, now_playing: Option<String>) {
    let title_style = if state.has_signal {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let lines = vec![
        Line::from(Span::styled(state.title.clone(), title_style)),
        Line::from(Span::styled(
            now_playing.unwrap_or_default(),
            Style::default().fg(Color::Magenta),
        )),
    ];
    let block = Block::bordered().title(" slowed + reverb ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_position(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let label = format!("{} / {}", format_time(state.position), format_time(state.duration));
    let gauge = Gauge::default()
        .block(Block::bordered().title(if state.playing { " playing " } else { " paused " }))
        .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
        .ratio(state.progress())
        .label(label);
    frame.render_widget(gauge, area);
}

fn draw_sliders(frame: &mut Frame, areas: &[Rect], state: &DisplayState) {
    let sliders = [
        Slider {
            label: "SPEED",
            keys: "[ ]",
            value: state.rate,
            min: 0.5,
            max: 1.5,
            text: format!("{:.2}x", state.rate),
        },
        Slider {
            label: "REVERB",
            keys: "- =",
            value: state.mix,
            min: 0.0,
            max: 1.0,
            text: format!("{:.0}%", state.mix * 100.0),
        },
        Slider {
            label: "LENGTH",
            keys: ", .",
            value: state.tail,
            min: 0.0,
            max: 10.0,
            text: format!("{:.2}s", state.tail),
        },
    ];
    for (slider, area) in sliders.iter().zip(areas) {
        draw_slider(frame, *area, slider);
    }
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState, spinner: usize) {
    let line = if let Some(busy) = state.busy {
        Line::from(format!("{} {busy}…", SPINNER[spinner % SPINNER.len()]))
    } else if let Some(msg) = &state.message {
        Line::from(msg.as_str())
    } else if state.has_signal && state.clock_suspended {
        Line::from("press space to start audio")
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(line).style(Style::default().fg(Color::Yellow)), area);
}
