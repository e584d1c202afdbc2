//! Viewport follow controller

use crate::config::{CameraSpec, StageSpec};

/// Horizontal camera easing toward the fighters' midpoint
#[derive(Debug, Clone)]
pub struct CameraController {
    pub x: f32,
    pub target_x: f32,
    pub smoothing: f32,
    viewport_width: f32,
    stage_width: f32,
}

impl CameraController {
    pub fn new(camera: &CameraSpec, stage: &StageSpec) -> Self {
        Self {
            x: 0.0,
            target_x: 0.0,
            smoothing: camera.smoothing,
            viewport_width: stage.viewport_width,
            stage_width: stage.width,
        }
    }

    /// Left edge that centers the viewport between two x positions
    pub fn target_for(&self, a_x: f32, b_x: f32) -> f32 {
        let mid = (a_x + b_x) / 2.0;
        let max = (self.stage_width - self.viewport_width).max(0.0);
        (mid - self.viewport_width / 2.0).clamp(0.0, max)
    }

    /// One smoothing step
    pub fn update(&mut self, a_x: f32, b_x: f32) {
        self.target_x = self.target_for(a_x, b_x);
        self.x += (self.target_x - self.x) * self.smoothing;
    }

    /// Jump straight to the target (round start)
    pub fn snap(&mut self, a_x: f32, b_x: f32) {
        self.target_x = self.target_for(a_x, b_x);
        self.x = self.target_x;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;

    fn camera() -> CameraController {
        let tuning = Tuning::builtin().expect("builtin tuning");
        CameraController::new(&tuning.camera, &tuning.stage)
    }

    #[test]
    fn test_target_is_clamped_to_stage() {
        let cam = camera();
        assert_eq!(cam.target_for(0.0, 100.0), 0.0);
        assert_eq!(cam.target_for(1500.0, 1520.0), 800.0);
        assert_eq!(cam.target_for(600.0, 1000.0), 400.0);
    }

    #[test]
    fn test_exponential_smoothing() {
        let mut cam = camera();
        cam.update(600.0, 1000.0);
        assert!((cam.x - 40.0).abs() < 1e-4);
        cam.update(600.0, 1000.0);
        assert!((cam.x - 76.0).abs() < 1e-4);
    }

    #[test]
    fn test_converges_without_overshoot() {
        let mut cam = camera();
        for _ in 0..500 {
            cam.update(600.0, 1000.0);
            assert!(cam.x <= 400.0);
        }
        assert!((cam.x - 400.0).abs() < 0.01);
    }

    #[test]
    fn test_snap() {
        let mut cam = camera();
        cam.snap(300.0, 1220.0);
        assert_eq!(cam.x, 360.0);
        assert_eq!(cam.x, cam.target_x);
    }
}
