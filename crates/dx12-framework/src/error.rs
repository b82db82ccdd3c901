pub type FrameResult<T, E = FrameReport> = core::result::Result<T, E>;

/// Fatal error report. Every failure in this crate is terminal for the process;
/// the report only exists to carry a readable chain up to `main`.
pub struct FrameReport {
    inner: eyre::Report,
}

impl FrameReport {
    pub fn into_report(self) -> eyre::Report {
        self.inner
    }

    /// Prepends the name of the operation that was in progress.
    pub fn during(self, operation: &'static str) -> Self {
        Self {
            inner: self.inner.wrap_err(operation),
        }
    }
}

impl From<eyre::Report> for FrameReport {
    fn from(report: eyre::Report) -> Self {
        Self { inner: report }
    }
}

impl From<std::io::Error> for FrameReport {
    fn from(error: std::io::Error) -> Self {
        Self {
            inner: eyre::Report::new(error),
        }
    }
}

impl std::fmt::Display for FrameReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::fmt::Debug for FrameReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for FrameReport {
    fn from(error: windows::core::Error) -> Self {
        Self {
            inner: eyre::Report::new(WrappedWindowsError::new(None, &error)),
        }
    }
}

/// HRESULT failure captured by value so the report stays `Send + Sync`.
#[cfg(windows)]
pub struct WrappedWindowsError {
    operation: Option<&'static str>,
    code: windows::core::HRESULT,
    message: String,
}

#[cfg(windows)]
impl WrappedWindowsError {
    fn new(operation: Option<&'static str>, error: &windows::core::Error) -> Self {
        Self {
            operation,
            code: error.code(),
            message: error.message(),
        }
    }
}

#[cfg(windows)]
impl std::error::Error for WrappedWindowsError {}

#[cfg(windows)]
impl std::fmt::Display for WrappedWindowsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operation {
            Some(operation) => write!(
                f,
                "{operation} failed ({:#010x}): {}",
                self.code.0, self.message
            ),
            None => write!(f, "{:#010x}: {}", self.code.0, self.message),
        }
    }
}

#[cfg(windows)]
impl std::fmt::Debug for WrappedWindowsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Attaches the failing API call's name to an error.
pub trait OperationContext<T> {
    fn during(self, operation: &'static str) -> FrameResult<T>;
}

impl<T> OperationContext<T> for FrameResult<T> {
    fn during(self, operation: &'static str) -> FrameResult<T> {
        self.map_err(|report| report.during(operation))
    }
}

#[cfg(windows)]
impl<T> OperationContext<T> for windows::core::Result<T> {
    fn during(self, operation: &'static str) -> FrameResult<T> {
        self.map_err(|error| FrameReport {
            inner: eyre::Report::new(WrappedWindowsError::new(Some(operation), &error)),
        })
    }
}
