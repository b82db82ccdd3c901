use dx12_framework::config::AppConfig;
use tracing::error;
use tracing::info;

pub fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::SubscriberBuilder::default()
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_target(false)
        .init();

    let config = AppConfig::from_env().map_err(|report| report.into_report())?;
    info!(?config, "starting");

    if let Err(report) = run(&config) {
        let report = report.into_report();
        error!("{report:?}");
        report_fatal(&format!("{report:#}"));
        return Err(report);
    }
    Ok(())
}

#[cfg(windows)]
fn run(config: &AppConfig) -> dx12_framework::error::FrameResult<()> {
    dx12_framework::d3d12::app::run(config)
}

#[cfg(windows)]
fn report_fatal(message: &str) {
    dx12_framework::d3d12::window::show_fatal_error(message);
}

#[cfg(not(windows))]
fn run(_config: &AppConfig) -> dx12_framework::error::FrameResult<()> {
    Err(eyre::eyre!("Direct3D 12 is only available on Windows").into())
}

#[cfg(not(windows))]
fn report_fatal(message: &str) {
    eprintln!("{message}");
}
