/// Time added per frame tick. Not tied to the wall clock.
pub const FRAME_TIME_STEP: f64 = 0.01;

/// Counters read by time-driven shaders.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameState {
    pub time: f64,
    pub frame_index: u64,
}

impl FrameState {
    /// Derived from the index so the step never drifts.
    pub fn advance(&mut self) {
        self.frame_index += 1;
        self.time = self.frame_index as f64 * FRAME_TIME_STEP;
    }

    /// `time` narrowed for shader uniforms.
    pub fn shader_time(&self) -> f32 {
        self.time as f32
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameState, FRAME_TIME_STEP};

    #[test]
    fn advance_steps_time_and_index_once() {
        let mut frame = FrameState::default();
        frame.advance();
        assert_eq!(frame.frame_index, 1);
        assert_eq!(frame.time, FRAME_TIME_STEP);

        let mut previous = frame;
        for _ in 0..1000 {
            frame.advance();
            assert!(frame.time > previous.time);
            assert_eq!(frame.frame_index, previous.frame_index + 1);
            previous = frame;
        }
    }

    #[test]
    fn time_tracks_frame_count_without_drift() {
        let mut frame = FrameState::default();
        for _ in 0..1_000_000 {
            frame.advance();
        }
        assert!((frame.time - 10_000.0).abs() < 1e-6);

        let mut late = FrameState {
            time: 0.0,
            frame_index: 26_214_400,
        };
        late.advance();
        let before = late.time;
        late.advance();
        assert!(late.time > before);
        assert!((late.time - before - FRAME_TIME_STEP).abs() < 1e-6);
    }
}
