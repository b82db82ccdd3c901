use std::ffi::c_void;
use std::ptr::NonNull;

use eyre::eyre;
use tracing::error;
use tracing::info;
use windows::core::w;
use windows::core::Param;
use windows::core::ParamValue;
use windows::core::HSTRING;
use windows::core::PCWSTR;
use windows::Win32::Foundation::*;
use windows::Win32::System::LibraryLoader::GetModuleHandleExW;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::error::FrameResult;
use crate::error::OperationContext;
use crate::input::keys;
use crate::input::InputDevice;
use crate::input::InputEvent;
use crate::input::MouseButton;

const CLASS_NAME: PCWSTR = w!("Dx12FrameworkWindow");
const MIN_TRACK_SIZE: i32 = 200;

/// Everything the window procedure mutates. Lives in a `Box` owned by
/// [`MainWindow`]; the window's user data points at it.
#[derive(Default)]
pub struct WindowState {
    pub input: InputDevice,
    pub client_size: (u32, u32),
    /// Set when the client area changed and the swapchain has not caught up.
    pub pending_resize: Option<(u32, u32)>,
    pub minimized: bool,
    /// Inside an interactive size/move loop.
    pub resizing: bool,
    pub quit_requested: bool,
    destroyed: bool,
}

impl WindowState {
    /// True while rendering should be suspended.
    pub fn is_paused(&self) -> bool {
        self.minimized || self.resizing
    }
}

/// Equivalent to the MAKEINTATOM macro.
#[allow(non_snake_case)]
fn MAKEINTOATOM(atom: u16) -> PCWSTR {
    PCWSTR(atom as *const u16)
}

pub struct ClassIdAtom(u16);

impl Param<PCWSTR> for &ClassIdAtom {
    unsafe fn param(self) -> ParamValue<PCWSTR> {
        ParamValue::Owned(MAKEINTOATOM(self.0))
    }
}

fn register_window_class(instance: HMODULE) -> FrameResult<ClassIdAtom> {
    let class = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(wndproc),
        hInstance: instance.into(),
        hCursor: unsafe { LoadCursorW(None, IDC_ARROW) }.during("LoadCursorW")?,
        lpszClassName: CLASS_NAME,
        ..Default::default()
    };
    let atom = unsafe { RegisterClassExW(&class) };
    if atom == 0 {
        return Err(windows::core::Error::from_win32()).during("RegisterClassExW");
    }
    Ok(ClassIdAtom(atom))
}

/// The application's top-level window and the state its messages feed.
///
/// The state is reached only through the raw pointer the window procedure
/// also holds, never through a `Box` borrow, and is freed after the window.
pub struct MainWindow {
    hwnd: HWND,
    state: NonNull<WindowState>,
}

impl MainWindow {
    pub fn new(title: &str, width: u32, height: u32) -> FrameResult<Self> {
        let mut instance = HMODULE::default();
        unsafe { GetModuleHandleExW(Default::default(), None, &mut instance) }
            .during("GetModuleHandleExW")?;
        let class = register_window_class(instance)?;

        let mut window_rect = RECT {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        };
        unsafe { AdjustWindowRect(&mut window_rect, WS_OVERLAPPEDWINDOW, false) }
            .during("AdjustWindowRect")?;

        let state = NonNull::from(Box::leak(Box::new(WindowState {
            client_size: (width, height),
            ..Default::default()
        })));
        let created = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                &class,
                &HSTRING::from(title),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                window_rect.right - window_rect.left,
                window_rect.bottom - window_rect.top,
                None,
                None,
                Some(instance.into()),
                Some(state.as_ptr() as *const c_void),
            )
        }
        .during("CreateWindowExW");
        let hwnd = match created {
            Ok(hwnd) => hwnd,
            Err(report) => {
                drop(unsafe { Box::from_raw(state.as_ptr()) });
                return Err(report);
            }
        };

        info!(width, height, "window created");
        Ok(Self { hwnd, state })
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    pub fn show(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOW);
        }
    }

    /// Must not be held across anything that dispatches window messages.
    pub fn state(&self) -> &WindowState {
        unsafe { self.state.as_ref() }
    }

    /// Must not be held across anything that dispatches window messages.
    pub fn state_mut(&mut self) -> &mut WindowState {
        unsafe { self.state.as_mut() }
    }

    /// Dispatches every queued message. Returns false once the loop should end.
    pub fn pump(&mut self) -> bool {
        let mut message = MSG::default();
        while unsafe { PeekMessageW(&mut message, None, 0, 0, PM_REMOVE) }.as_bool() {
            if message.message == WM_QUIT {
                self.state_mut().quit_requested = true;
                break;
            }
            unsafe {
                let _ = TranslateMessage(&message);
                DispatchMessageW(&message);
            }
        }
        !self.state().quit_requested
    }

    pub fn set_title(&self, title: &str) -> FrameResult<()> {
        unsafe { SetWindowTextW(self.hwnd, &HSTRING::from(title)) }.during("SetWindowTextW")
    }
}

impl Drop for MainWindow {
    fn drop(&mut self) {
        if !self.state().destroyed {
            let _ = unsafe { DestroyWindow(self.hwnd) };
        }
        // WM_DESTROY cleared the user data, so nothing can reach the state now.
        drop(unsafe { Box::from_raw(self.state.as_ptr()) });
    }
}

/// Blocking error dialog for fatal reports.
pub fn show_fatal_error(message: &str) {
    let _ = unsafe {
        MessageBoxW(
            None,
            &HSTRING::from(message),
            w!("Fatal error"),
            MB_OK | MB_ICONERROR,
        )
    };
}

fn loword(value: isize) -> u32 {
    (value as usize & 0xFFFF) as u32
}

fn hiword(value: isize) -> u32 {
    ((value as usize >> 16) & 0xFFFF) as u32
}

/// Signed cursor coordinates packed in `lparam`.
fn cursor_position(lparam: LPARAM) -> (i32, i32) {
    (
        loword(lparam.0) as u16 as i16 as i32,
        hiword(lparam.0) as u16 as i16 as i32,
    )
}

fn handle_message(
    state: &mut WindowState,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> Option<LRESULT> {
    match message {
        WM_SIZE => {
            let size = (loword(lparam.0), hiword(lparam.0));
            state.client_size = size;
            match wparam.0 as u32 {
                SIZE_MINIMIZED => state.minimized = true,
                _ => {
                    state.minimized = false;
                    if !state.resizing && size.0 > 0 && size.1 > 0 {
                        state.pending_resize = Some(size);
                    }
                }
            }
        }
        WM_ENTERSIZEMOVE => state.resizing = true,
        WM_EXITSIZEMOVE => {
            state.resizing = false;
            state.pending_resize = Some(state.client_size);
        }
        WM_GETMINMAXINFO => {
            let info = unsafe { &mut *(lparam.0 as *mut MINMAXINFO) };
            info.ptMinTrackSize = POINT {
                x: MIN_TRACK_SIZE,
                y: MIN_TRACK_SIZE,
            };
        }
        WM_KEYDOWN => {
            let key = wparam.0 as u8;
            state.input.process(InputEvent::KeyDown(key));
            if key == keys::ESCAPE {
                state.quit_requested = true;
                unsafe { PostQuitMessage(0) };
            }
        }
        WM_KEYUP => state.input.process(InputEvent::KeyUp(wparam.0 as u8)),
        WM_CHAR => {
            if let Some(ch) = char::from_u32(wparam.0 as u32) {
                state.input.process(InputEvent::Char(ch));
            }
        }
        WM_MOUSEMOVE => {
            let (x, y) = cursor_position(lparam);
            state.input.process(InputEvent::MouseMove { x, y });
        }
        WM_LBUTTONDOWN | WM_RBUTTONDOWN | WM_MBUTTONDOWN => {
            let button = match message {
                WM_LBUTTONDOWN => MouseButton::Left,
                WM_RBUTTONDOWN => MouseButton::Right,
                _ => MouseButton::Middle,
            };
            let (x, y) = cursor_position(lparam);
            state.input.process(InputEvent::MouseMove { x, y });
            state.input.process(InputEvent::MouseDown(button));
        }
        WM_LBUTTONUP | WM_RBUTTONUP | WM_MBUTTONUP => {
            let button = match message {
                WM_LBUTTONUP => MouseButton::Left,
                WM_RBUTTONUP => MouseButton::Right,
                _ => MouseButton::Middle,
            };
            state.input.process(InputEvent::MouseUp(button));
        }
        WM_MOUSEWHEEL => {
            let delta = hiword(wparam.0 as isize) as u16 as i16 as i32;
            state.input.process(InputEvent::Wheel(delta));
        }
        _ => return None,
    }
    Some(LRESULT(0))
}

extern "system" fn wndproc(window: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if message == WM_CREATE {
        unsafe {
            let create_struct: &CREATESTRUCTW = &*(lparam.0 as *const CREATESTRUCTW);
            SetWindowLongPtrW(window, GWLP_USERDATA, create_struct.lpCreateParams as _);
        }
        return LRESULT(0);
    }

    let user_data = unsafe { GetWindowLongPtrW(window, GWLP_USERDATA) };
    let Some(mut state) = NonNull::new(user_data as *mut WindowState) else {
        // Messages can arrive before WM_CREATE and after WM_DESTROY.
        return unsafe { DefWindowProcW(window, message, wparam, lparam) };
    };
    let state = unsafe { state.as_mut() };

    if message == WM_DESTROY {
        state.destroyed = true;
        state.quit_requested = true;
        unsafe {
            SetWindowLongPtrW(window, GWLP_USERDATA, 0);
            PostQuitMessage(0);
        }
        return LRESULT(0);
    }

    let handled = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        handle_message(state, message, wparam, lparam)
    }))
    .unwrap_or_else(|_| {
        error!(message, "panic while handling window message");
        None
    });

    match handled {
        Some(result) => result,
        None => unsafe { DefWindowProcW(window, message, wparam, lparam) },
    }
}

/// Client size of a window as Win32 reports it, for sanity checks after creation.
pub fn client_size(hwnd: HWND) -> FrameResult<(u32, u32)> {
    let mut rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut rect) }.during("GetClientRect")?;
    let width = u32::try_from(rect.right - rect.left)
        .map_err(|_| eyre!("negative client width"))?;
    let height = u32::try_from(rect.bottom - rect.top)
        .map_err(|_| eyre!("negative client height"))?;
    Ok((width, height))
}
