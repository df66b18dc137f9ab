/// System-tray icon with a single "Quit" entry.
///
/// The icon lives on a dedicated OS thread with its own Windows message pump,
/// independent of both the GUI event loop and the process watcher. Choosing
/// "Quit" runs the supplied callback, which is expected to end the process.
///
/// On non-Windows platforms [`start`] compiles but installs nothing.
use anyhow::Result;

pub const ICON_SIZE: u32 = 32;

/// RGBA pixels of the tray icon: a solid black square.
pub fn icon_rgba() -> Vec<u8> {
    [0u8, 0, 0, 255].repeat((ICON_SIZE * ICON_SIZE) as usize)
}

/// A handle to the tray thread. The thread ends with the process.
pub struct TrayHandle {
    #[cfg(windows)]
    _thread: std::thread::JoinHandle<()>,
}

/// Spawns the tray thread. `on_quit` runs on that thread when "Quit" is chosen.
pub fn start<F>(on_quit: F) -> Result<TrayHandle>
where
    F: Fn() + Send + 'static,
{
    #[cfg(windows)]
    {
        use anyhow::Context;

        let thread = std::thread::Builder::new()
            .name("tray-pump".into())
            .spawn(move || imp::run_message_pump(on_quit))
            .context("Failed to spawn tray thread")?;
        Ok(TrayHandle { _thread: thread })
    }

    #[cfg(not(windows))]
    {
        drop(on_quit);
        tracing::debug!("Tray icon is only available on Windows");
        Ok(TrayHandle {})
    }
}

// ── Windows implementation ────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use tray_icon::menu::{Menu, MenuEvent, MenuItem};
    use tray_icon::{Icon, TrayIconBuilder};
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, TranslateMessage, MSG,
    };

    use super::{icon_rgba, ICON_SIZE};

    const TOOLTIP: &str = "Game Music Control";

    /// Builds the tray icon and pumps messages for it until the process exits.
    /// The icon's hidden window belongs to this thread, so its menu events
    /// are produced while dispatching here.
    pub fn run_message_pump<F: Fn()>(on_quit: F) {
        let quit_item = MenuItem::new("Quit", true, None);
        let menu = Menu::new();
        if let Err(e) = menu.append(&quit_item) {
            tracing::error!("Failed to build tray menu: {e}");
            return;
        }

        let icon = match Icon::from_rgba(icon_rgba(), ICON_SIZE, ICON_SIZE) {
            Ok(icon) => icon,
            Err(e) => {
                tracing::error!("Failed to build tray icon: {e}");
                return;
            }
        };

        let _tray = match TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip(TOOLTIP)
            .with_icon(icon)
            .build()
        {
            Ok(tray) => tray,
            Err(e) => {
                tracing::error!("Failed to create tray icon: {e}");
                return;
            }
        };

        let quit_id = quit_item.id().clone();
        tracing::debug!("Tray icon installed");

        unsafe {
            let mut msg = MSG::default();
            // GetMessageW: >0 = message, 0 = WM_QUIT, <0 = error.
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);

                while let Ok(event) = MenuEvent::receiver().try_recv() {
                    if event.id == quit_id {
                        on_quit();
                    }
                }
            }
        }

        tracing::debug!("Tray thread exited");
    }
}
