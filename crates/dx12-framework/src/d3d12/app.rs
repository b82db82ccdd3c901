use std::time::Duration;

use tracing::info;
use tracing::warn;

use super::demo::build_demo;
use super::demo::Demo;
use super::renderer::Renderer;
use super::window::client_size;
use super::window::MainWindow;
use crate::config::AppConfig;
use crate::error::FrameResult;
use crate::frame::Viewport;
use crate::stats::FrameStats;
use crate::timer::GameTimer;

const PAUSED_SLEEP: Duration = Duration::from_millis(100);

/// Creates the window and renderer, runs the message loop until quit, and
/// drains the GPU before anything is released.
pub fn run(config: &AppConfig) -> FrameResult<()> {
    let title = if config.use_warp_device {
        "DirectX 12 Framework (WARP)"
    } else {
        "DirectX 12 Framework"
    };
    let mut window = MainWindow::new(title, config.width, config.height)?;
    let (width, height) = client_size(window.hwnd())?;
    if (width, height) != (config.width, config.height) {
        warn!(width, height, "client area differs from the requested size");
    }
    let mut renderer = Renderer::new(config, window.hwnd(), Viewport::new(width, height))?;

    // Declared after the renderer so it is dropped first, and only once the
    // queue has been drained below.
    let mut demo = match build_demo(config, &mut renderer) {
        Ok(demo) => demo,
        Err(report) => {
            renderer.report_failure();
            return Err(report);
        }
    };
    let result = run_loop(&mut window, &mut renderer, demo.as_mut());

    match result {
        Ok(()) => {
            let fence = renderer.drain_for_shutdown()?;
            info!(fence, frames = renderer.frames().frames_completed(), "GPU drained, shutting down");
            Ok(())
        }
        Err(report) => {
            renderer.report_failure();
            if let Err(drain_error) = renderer.drain_for_shutdown() {
                warn!("GPU drain after failure also failed: {drain_error}");
            }
            Err(report)
        }
    }
}

fn run_loop(window: &mut MainWindow, renderer: &mut Renderer, demo: &mut dyn Demo) -> FrameResult<()> {
    window.show();

    let mut timer = GameTimer::new();
    let mut stats = FrameStats::default();
    while window.pump() {
        let state = window.state_mut();
        if state.is_paused() {
            timer.stop();
            std::thread::sleep(PAUSED_SLEEP);
            continue;
        }
        timer.start();

        if let Some((width, height)) = state.pending_resize.take() {
            renderer.resize(width, height)?;
            demo.on_resize(renderer.viewport());
        }

        state.input.begin_frame();
        timer.tick();
        if let Some(title) = stats.frame(&demo.caption(), timer.total_time()) {
            window.set_title(&title)?;
        }

        demo.update(renderer, &window.state().input, &timer)?;
        demo.draw(renderer)?;
    }
    Ok(())
}
