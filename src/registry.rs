use crate::logger::LoggerDevice;
use crate::pl1000::Pl1000Api;
use crossbeam_channel::tick;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Named logger devices driven from one host thread.
pub struct SessionRegistry<D: Pl1000Api> {
    devices: Vec<LoggerDevice<D>>,
}

impl<D: Pl1000Api> Default for SessionRegistry<D> {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
        }
    }
}

impl<D: Pl1000Api> SessionRegistry<D> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a device; a device with the same name is replaced and returned.
    pub fn insert(&mut self, device: LoggerDevice<D>) -> Option<LoggerDevice<D>> {
        match self.devices.iter().position(|d| d.name() == device.name()) {
            Some(i) => {
                warn!("Replacing device {}", device.name());
                Some(std::mem::replace(&mut self.devices[i], device))
            }
            None => {
                self.devices.push(device);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<LoggerDevice<D>> {
        let i = self.devices.iter().position(|d| d.name() == name)?;
        Some(self.devices.remove(i))
    }

    pub fn get(&self, name: &str) -> Option<&LoggerDevice<D>> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut LoggerDevice<D>> {
        self.devices.iter_mut().find(|d| d.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.name())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LoggerDevice<D>> {
        self.devices.iter_mut()
    }

    /// One pass over all devices. Returns the names of devices whose capture finished.
    pub fn poll_once(&mut self) -> Vec<String> {
        self.devices
            .iter_mut()
            .filter_map(|d| d.poll().then(|| d.name().to_string()))
            .collect()
    }

    /// Poll every `interval` until `shutdown` is set.
    ///
    /// `on_capture` runs for each device right after its capture was read.
    pub fn run_poll_loop<F>(&mut self, interval: Duration, shutdown: &AtomicBool, mut on_capture: F)
    where
        F: FnMut(&mut LoggerDevice<D>),
    {
        let ticker = tick(interval);
        info!("Poll loop started, {} devices every {:?}", self.len(), interval);
        while !shutdown.load(Ordering::SeqCst) {
            let _ = ticker.recv();
            for name in self.poll_once() {
                debug!("{} capture finished", name);
                if let Some(dev) = self.get_mut(&name) {
                    on_capture(dev);
                }
            }
        }
        info!("Poll loop stopped");
    }
}
