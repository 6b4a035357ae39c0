//! macOS power notifications via IOKit.
//!
//! Registers with the root power domain (`IORegisterForSystemPower`) and
//! services its notification port on a dedicated CoreFoundation run loop.
//! Sleep requests are always acknowledged; the agent only observes.
//!
//! IOKit gives no usable message before user processes are killed at
//! shutdown. launchd sends SIGTERM instead, which the agent journals as
//! `app_close` on its way out.

use crate::collector::types::{
    wait_for_registration, ChannelObserver, CollectorError, Notification, PowerObserver,
    RegistrationReport, CHANNEL_CAPACITY, REGISTRATION_TIMEOUT,
};
use core_foundation::base::TCFType;
use core_foundation::runloop::{
    kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopSource, CFRunLoopSourceRef,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

type IoObject = u32;
type IoConnect = u32;
type IoNotificationPortRef = *mut c_void;
type IoServiceInterestCallback =
    extern "C" fn(refcon: *mut c_void, service: IoObject, message_type: u32, argument: *mut c_void);

// IOMessage.h: iokit_common_msg(x) = 0xE0000000 | x
const K_IO_MESSAGE_CAN_SYSTEM_SLEEP: u32 = 0xE000_0270;
const K_IO_MESSAGE_SYSTEM_WILL_SLEEP: u32 = 0xE000_0280;
const K_IO_MESSAGE_SYSTEM_HAS_POWERED_ON: u32 = 0xE000_0300;

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    fn IORegisterForSystemPower(
        refcon: *mut c_void,
        the_port_ref: *mut IoNotificationPortRef,
        callback: IoServiceInterestCallback,
        notifier: *mut IoObject,
    ) -> IoConnect;
    fn IODeregisterForSystemPower(notifier: *mut IoObject) -> i32;
    fn IONotificationPortGetRunLoopSource(notify: IoNotificationPortRef) -> CFRunLoopSourceRef;
    fn IONotificationPortDestroy(notify: IoNotificationPortRef);
    fn IOAllowPowerChange(kernel_port: IoConnect, notification_id: isize) -> i32;
    fn IOServiceClose(connect: IoConnect) -> i32;
}

thread_local! {
    static OBSERVER: RefCell<Option<ChannelObserver>> = const { RefCell::new(None) };
    static ROOT_PORT: Cell<IoConnect> = const { Cell::new(0) };
}

/// The macOS power collector.
pub struct MacOSCollector {
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSCollector {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start listening for power notifications in a background thread.
    ///
    /// Returns once the thread has registered with IOKit, or with the reason
    /// it could not.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let observer = self.observer();
        let running = self.running.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            if let Err(e) = run_power_loop(observer, running.clone(), &ready_tx) {
                tracing::error!("Power notification loop failed: {e}");
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
            // The run loop wakes every 100ms to check the flag
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

impl Default for MacOSCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MacOSCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

extern "C" fn power_callback(
    _refcon: *mut c_void,
    _service: IoObject,
    message_type: u32,
    argument: *mut c_void,
) {
    let acknowledge = || {
        let port = ROOT_PORT.with(|p| p.get());
        unsafe {
            IOAllowPowerChange(port, argument as isize);
        }
    };

    match message_type {
        K_IO_MESSAGE_CAN_SYSTEM_SLEEP => acknowledge(),
        K_IO_MESSAGE_SYSTEM_WILL_SLEEP => {
            notify(|o| o.on_sleep());
            acknowledge();
        }
        K_IO_MESSAGE_SYSTEM_HAS_POWERED_ON => notify(|o| o.on_wake()),
        _ => {}
    }
}

fn notify(f: impl FnOnce(&mut ChannelObserver)) {
    OBSERVER.with(|cell| {
        if let Some(ref mut observer) = *cell.borrow_mut() {
            f(observer);
        }
    });
}

fn run_power_loop(
    observer: ChannelObserver,
    running: Arc<AtomicBool>,
    ready: &RegistrationReport,
) -> Result<(), CollectorError> {
    OBSERVER.with(|cell| *cell.borrow_mut() = Some(observer));

    let mut port: IoNotificationPortRef = null_mut();
    let mut notifier: IoObject = 0;

    let root_port =
        unsafe { IORegisterForSystemPower(null_mut(), &mut port, power_callback, &mut notifier) };
    if root_port == 0 {
        return Err(CollectorError::RegistrationFailed(
            "IORegisterForSystemPower returned no connection".to_string(),
        ));
    }
    ROOT_PORT.with(|p| p.set(root_port));

    let raw_source = unsafe { IONotificationPortGetRunLoopSource(port) };
    if raw_source.is_null() {
        unsafe {
            IODeregisterForSystemPower(&mut notifier);
            IOServiceClose(root_port);
            IONotificationPortDestroy(port);
        }
        return Err(CollectorError::RegistrationFailed(
            "notification port has no run loop source".to_string(),
        ));
    }
    let source = unsafe { CFRunLoopSource::wrap_under_get_rule(raw_source) };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tracing::debug!("Registered for IOKit system power notifications");
    let _ = ready.try_send(Ok(()));

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopDefaultMode },
            Duration::from_millis(100),
            false,
        );
    }

    unsafe {
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
        IODeregisterForSystemPower(&mut notifier);
        IOServiceClose(root_port);
        IONotificationPortDestroy(port);
    }
    OBSERVER.with(|cell| *cell.borrow_mut() = None);

    Ok(())
}

/// Name of the notification source, for status output.
pub fn backend_name() -> &'static str {
    "IOKit system power"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = MacOSCollector::new();
        assert!(!collector.is_running());
        assert!(collector.try_recv().is_none());
    }
}
