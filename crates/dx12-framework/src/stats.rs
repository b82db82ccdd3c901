/// Counts frames and produces a window title once per second of game time.
#[derive(Debug, Default)]
pub struct FrameStats {
    frame_count: u32,
    window_start: f32,
}

impl FrameStats {
    /// Call once per frame with [`crate::timer::GameTimer::total_time`].
    /// Returns the new title when a full second has elapsed.
    pub fn frame(&mut self, caption: &str, total_time: f32) -> Option<String> {
        self.frame_count += 1;
        let elapsed = total_time - self.window_start;
        if elapsed < 1.0 {
            return None;
        }
        let fps = self.frame_count as f32 / elapsed;
        let ms_per_frame = 1000.0 / fps;
        let title = format!(
            "{caption} | Time: {total_time:.1}s | FPS: {} | ms: {ms_per_frame:.2}",
            fps.round() as u32
        );
        self.frame_count = 0;
        self.window_start = total_time;
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_updates_once_per_second() {
        let mut stats = FrameStats::default();
        let mut titles = Vec::new();
        for frame in 1..=120 {
            if let Some(title) = stats.frame("Cube", frame as f32 / 60.0) {
                titles.push(title);
            }
        }
        assert_eq!(
            titles,
            vec![
                "Cube | Time: 1.0s | FPS: 60 | ms: 16.67".to_owned(),
                "Cube | Time: 2.0s | FPS: 60 | ms: 16.67".to_owned(),
            ]
        );
    }
}
