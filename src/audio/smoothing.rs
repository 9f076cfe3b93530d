// Linear parameter ramps so gain and rate changes don't click.

pub const RAMP_SECONDS: f32 = 0.02;

#[derive(Clone, Debug)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_len: u32,
}

impl SmoothedParam {
    pub fn new(value: f32, sample_rate: u32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
            ramp_len: ((sample_rate as f32 * RAMP_SECONDS).round() as u32).max(1),
        }
    }

    pub fn set_target(&mut self, value: f32) {
        if value == self.target && self.remaining == 0 {
            return;
        }
        self.target = value;
        self.remaining = self.ramp_len;
        self.step = (value - self.current) / self.ramp_len as f32;
    }

    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target // land exactly, no float drift
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_over_twenty_milliseconds() {
        let mut p = SmoothedParam::new(0.0, 1000);
        p.set_target(1.0);
        let values: Vec<f32> = (0..20).map(|_| p.next()).collect();
        assert!(values.windows(2).all(|w| w[1] > w[0]), "ramp should rise monotonically");
        assert!((values[9] - 0.5).abs() < 1e-5);
        assert_eq!(values[19], 1.0);
        assert!(!p.is_ramping());
        assert_eq!(p.next(), 1.0);
    }

    #[test]
    fn immediate_skips_the_ramp() {
        let mut p = SmoothedParam::new(0.3, 44100);
        p.set_target(0.9);
        p.next();
        p.set_immediate(0.1);
        assert_eq!(p.next(), 0.1);
        assert_eq!(p.target(), 0.1);
    }
}
