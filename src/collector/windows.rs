//! Windows power notifications via a hidden top-level window.
//!
//! `WM_POWERBROADCAST` and `WM_ENDSESSION` are only delivered to top-level
//! windows, so the collector creates an invisible one and pumps its messages
//! on a background thread. The pump polls so it can notice `stop`.

use crate::collector::types::{
    wait_for_registration, ChannelObserver, CollectorError, Notification, PowerObserver,
    RegistrationReport, CHANNEL_CAPACITY, REGISTRATION_TIMEOUT,
};
use crate::journal::{Event, EventKind};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use windows::core::w;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, PeekMessageW,
    RegisterClassW, TranslateMessage, HMENU, MSG, PBT_APMRESUMEAUTOMATIC, PBT_APMSUSPEND,
    PM_REMOVE, WINDOW_EX_STYLE, WINDOW_STYLE, WM_ENDSESSION, WM_POWERBROADCAST, WNDCLASSW,
};

/// How long `WM_ENDSESSION` waits for the power-off event to be journaled.
/// Windows kills unresponsive apps after about five seconds.
const END_SESSION_TIMEOUT: Duration = Duration::from_secs(3);

thread_local! {
    static OBSERVER: RefCell<Option<ChannelObserver>> = const { RefCell::new(None) };
}

/// The Windows power collector.
pub struct WindowsCollector {
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsCollector {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start listening for power broadcasts in a background thread.
    ///
    /// Returns once the hidden window exists, or with the reason it could not
    /// be created.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let observer = self.observer();
        let running = self.running.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            if let Err(e) = run_message_loop(observer, running.clone(), &ready_tx) {
                tracing::error!("Power broadcast loop failed: {e}");
                let _ = ready_tx.try_send(Err(e));
            }
            running.store(false, Ordering::SeqCst);
        });
        self.thread_handle = Some(handle);

        if let Err(e) = wait_for_registration(&ready_rx, REGISTRATION_TIMEOUT) {
            self.stop();
            return Err(e);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// An observer feeding this collector's channel.
    pub fn observer(&self) -> ChannelObserver {
        ChannelObserver::new(self.sender.clone())
    }

    pub fn receiver(&self) -> &Receiver<Notification> {
        &self.receiver
    }

    pub fn try_recv(&self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

impl Default for WindowsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WindowsCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn notify(f: impl FnOnce(&mut ChannelObserver)) {
    OBSERVER.with(|cell| {
        if let Some(ref mut observer) = *cell.borrow_mut() {
            f(observer);
        }
    });
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    match msg {
        WM_POWERBROADCAST => {
            match w_param.0 as u32 {
                PBT_APMSUSPEND => notify(|o| o.on_sleep()),
                PBT_APMRESUMEAUTOMATIC => notify(|o| o.on_wake()),
                _ => {}
            }
            LRESULT(1)
        }
        WM_ENDSESSION => {
            // wParam is non-zero when the session really ends. The process
            // may be killed once this returns, so wait for the journal write.
            if w_param.0 != 0 {
                notify(|o| {
                    let event = Event::now(EventKind::PowerOff);
                    if !o.observe_confirmed(event, END_SESSION_TIMEOUT) {
                        tracing::warn!("Power-off was not journaled before session end");
                    }
                });
            }
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, w_param, l_param),
    }
}

fn run_message_loop(
    observer: ChannelObserver,
    running: Arc<AtomicBool>,
    ready: &RegistrationReport,
) -> Result<(), CollectorError> {
    OBSERVER.with(|cell| *cell.borrow_mut() = Some(observer));

    let registration_failed = |e: windows::core::Error| CollectorError::RegistrationFailed(e.to_string());

    unsafe {
        let module = GetModuleHandleW(None).map_err(registration_failed)?;
        let instance: HINSTANCE = module.into();
        let class_name = w!("CurfewPowerWatcher");

        let class = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            hInstance: instance,
            lpszClassName: class_name,
            ..Default::default()
        };
        if RegisterClassW(&class) == 0 {
            return Err(CollectorError::RegistrationFailed(
                "RegisterClassW failed".to_string(),
            ));
        }

        // Never shown; top-level so broadcasts reach it.
        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            class_name,
            w!("curfew"),
            WINDOW_STYLE::default(),
            0,
            0,
            0,
            0,
            HWND::default(),
            HMENU::default(),
            instance,
            None,
        )
        .map_err(registration_failed)?;
        tracing::debug!("Listening for WM_POWERBROADCAST");
        let _ = ready.try_send(Ok(()));

        let mut msg = MSG::default();
        while running.load(Ordering::SeqCst) {
            // Sent messages such as WM_POWERBROADCAST are delivered inside PeekMessageW.
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            thread::sleep(Duration::from_millis(50));
        }

        let _ = DestroyWindow(hwnd);
    }

    OBSERVER.with(|cell| *cell.borrow_mut() = None);
    Ok(())
}

/// Name of the notification source, for status output.
pub fn backend_name() -> &'static str {
    "Windows power broadcasts"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = WindowsCollector::new();
        assert!(!collector.is_running());
        assert!(collector.try_recv().is_none());
    }
}
