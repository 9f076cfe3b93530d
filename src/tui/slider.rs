use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, LineGauge};

// One parameter control: label, current value and keys, drawn as a line gauge
pub struct Slider<'a> {
    pub label: &'a str,
    pub keys: &'a str,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub text: String,
}

impl Slider<'_> {
    pub fn ratio(&self) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        (((self.value - self.min) / (self.max - self.min)) as f64).clamp(0.0, 1.0)
    }
}

pub fn draw_slider(frame: &mut Frame, area: Rect, slider: &Slider) {
    let block = Block::bordered()
        .title(format!(" {} ", slider.label))
        .title_bottom(format!(" {} ", slider.keys))
        .border_style(Style::default().fg(Color::DarkGray));
    let gauge = LineGauge::default()
        .block(block)
        .ratio(slider.ratio())
        .label(slider.text.clone())
        .filled_style(Style::default().fg(Color::LightMagenta))
        .unfilled_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(gauge, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slider(value: f32) -> Slider<'static> {
        Slider { label: "RATE", keys: "[ ]", value, min: 0.5, max: 1.5, text: String::new() }
    }

    #[test]
    fn ratio_is_clamped() {
        assert_eq!(slider(1.0).ratio(), 0.5);
        assert_eq!(slider(0.1).ratio(), 0.0);
        assert_eq!(slider(4.0).ratio(), 1.0);
    }
}
