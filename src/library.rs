use crate::pl1000::{
    BlockMethod, GetValues, Handle, PicoInfo, PicoStatus, PicoStatusCode, Pl1000Api,
};
use libc::{c_float, c_short, c_ushort};
use libloading::{Library, Symbol};
use log::debug;
use std::ffi::OsStr;

type FnOpenUnit = unsafe extern "C" fn(*mut c_short) -> PicoStatusCode;
type FnCloseUnit = unsafe extern "C" fn(c_short) -> PicoStatusCode;
type FnMaxValue = unsafe extern "C" fn(c_short, *mut c_ushort) -> PicoStatusCode;
type FnSetInterval =
    unsafe extern "C" fn(c_short, *mut u32, u32, *mut c_short, c_short) -> PicoStatusCode;
type FnSetTrigger = unsafe extern "C" fn(
    c_short,
    c_ushort,
    c_ushort,
    c_ushort,
    c_ushort,
    c_ushort,
    c_ushort,
    c_ushort,
    c_float,
) -> PicoStatusCode;
type FnRun = unsafe extern "C" fn(c_short, u32, u32) -> PicoStatusCode;
type FnReady = unsafe extern "C" fn(c_short, *mut c_short) -> PicoStatusCode;
type FnGetValues =
    unsafe extern "C" fn(c_short, *mut c_ushort, *mut u32, *mut c_ushort, *mut u32) -> PicoStatusCode;
type FnStop = unsafe extern "C" fn(c_short) -> PicoStatusCode;
type FnPingUnit = unsafe extern "C" fn(c_short) -> PicoStatusCode;
type FnGetUnitInfo =
    unsafe extern "C" fn(c_short, *mut i8, c_short, *mut c_short, u32) -> PicoStatusCode;
type FnSetDo = unsafe extern "C" fn(c_short, c_short, c_short) -> PicoStatusCode;
type FnSetPulseWidth = unsafe extern "C" fn(c_short, c_ushort, u8) -> PicoStatusCode;

const SYMBOLS: &[&[u8]] = &[
    b"pl1000OpenUnit\0",
    b"pl1000CloseUnit\0",
    b"pl1000MaxValue\0",
    b"pl1000SetInterval\0",
    b"pl1000SetTrigger\0",
    b"pl1000Run\0",
    b"pl1000Ready\0",
    b"pl1000GetValues\0",
    b"pl1000Stop\0",
    b"pl1000PingUnit\0",
    b"pl1000GetUnitInfo\0",
    b"pl1000SetDo\0",
    b"pl1000SetPulseWidth\0",
];

/// The vendor `pl1000` shared library, loaded at runtime.
pub struct Pl1000Library {
    lib: Library,
}

impl Pl1000Library {
    /// Load `pl1000` from the platform's default search path.
    pub fn load() -> Result<Self, libloading::Error> {
        Self::load_from(libloading::library_filename("pl1000"))
    }

    pub fn load_from<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let lib = unsafe { Library::new(path.as_ref()) }?;
        // fail at load time rather than on the first call that needs a missing entry point
        for name in SYMBOLS {
            unsafe { lib.get::<*const ()>(name) }?;
        }
        debug!("Loaded pl1000 from {:?}", path.as_ref());
        Ok(Self { lib })
    }

    fn symbol<T>(&self, name: &[u8]) -> Result<Symbol<'_, T>, PicoStatus> {
        unsafe { self.lib.get::<T>(name) }.map_err(|_| PicoStatus::OperationFailed)
    }
}

impl Pl1000Api for Pl1000Library {
    fn open_unit(&mut self) -> Result<Handle, PicoStatus> {
        let f: Symbol<FnOpenUnit> = self.symbol(b"pl1000OpenUnit\0")?;
        let mut handle: c_short = 0;
        PicoStatus::check(unsafe { f(&mut handle) })?;
        Ok(handle)
    }

    fn close_unit(&mut self, handle: Handle) -> Result<(), PicoStatus> {
        let f: Symbol<FnCloseUnit> = self.symbol(b"pl1000CloseUnit\0")?;
        PicoStatus::check(unsafe { f(handle) })
    }

    fn max_value(&mut self, handle: Handle) -> Result<u16, PicoStatus> {
        let f: Symbol<FnMaxValue> = self.symbol(b"pl1000MaxValue\0")?;
        let mut max_count: c_ushort = 0;
        PicoStatus::check(unsafe { f(handle, &mut max_count) })?;
        Ok(max_count)
    }

    fn set_interval(
        &mut self,
        handle: Handle,
        us_for_block: &mut u32,
        samples: &mut u32,
        channels: &[i16],
    ) -> Result<(), PicoStatus> {
        let f: Symbol<FnSetInterval> = self.symbol(b"pl1000SetInterval\0")?;
        let mut channels = channels.to_vec();
        let res = unsafe {
            f(
                handle,
                us_for_block as *mut u32,
                *samples,
                channels.as_mut_ptr(),
                channels.len() as c_short,
            )
        };
        PicoStatus::check(res)
    }

    fn set_trigger(
        &mut self,
        handle: Handle,
        enabled: u16,
        auto_trigger: u16,
        auto_ms: u16,
        channel: u16,
        direction: u16,
        threshold: u16,
        hysteresis: u16,
        delay: f32,
    ) -> Result<(), PicoStatus> {
        let f: Symbol<FnSetTrigger> = self.symbol(b"pl1000SetTrigger\0")?;
        let res = unsafe {
            f(
                handle,
                enabled,
                auto_trigger,
                auto_ms,
                channel,
                direction,
                threshold,
                hysteresis,
                delay,
            )
        };
        PicoStatus::check(res)
    }

    fn run(
        &mut self,
        handle: Handle,
        no_of_values: u32,
        method: BlockMethod,
    ) -> Result<(), PicoStatus> {
        let f: Symbol<FnRun> = self.symbol(b"pl1000Run\0")?;
        PicoStatus::check(unsafe { f(handle, no_of_values, method as u32) })
    }

    fn ready(&mut self, handle: Handle) -> Result<bool, PicoStatus> {
        let f: Symbol<FnReady> = self.symbol(b"pl1000Ready\0")?;
        let mut ready: c_short = 0;
        PicoStatus::check(unsafe { f(handle, &mut ready) })?;
        Ok(ready != 0)
    }

    fn get_values(
        &mut self,
        handle: Handle,
        values: &mut [u16],
        no_of_values: u32,
    ) -> Result<GetValues, PicoStatus> {
        let f: Symbol<FnGetValues> = self.symbol(b"pl1000GetValues\0")?;
        let mut out = GetValues {
            delivered: no_of_values,
            ..Default::default()
        };
        let res = unsafe {
            f(
                handle,
                values.as_mut_ptr(),
                &mut out.delivered,
                &mut out.overflow,
                &mut out.trigger_index,
            )
        };
        PicoStatus::check(res)?;
        Ok(out)
    }

    fn stop(&mut self, handle: Handle) -> Result<(), PicoStatus> {
        let f: Symbol<FnStop> = self.symbol(b"pl1000Stop\0")?;
        PicoStatus::check(unsafe { f(handle) })
    }

    fn ping_unit(&mut self, handle: Handle) -> Result<(), PicoStatus> {
        let f: Symbol<FnPingUnit> = self.symbol(b"pl1000PingUnit\0")?;
        PicoStatus::check(unsafe { f(handle) })
    }

    fn get_unit_info(&mut self, handle: Handle, info: PicoInfo) -> Result<String, PicoStatus> {
        let f: Symbol<FnGetUnitInfo> = self.symbol(b"pl1000GetUnitInfo\0")?;
        // first call only asks for the required length
        let mut required: c_short = 0;
        PicoStatus::check(unsafe {
            f(handle, std::ptr::null_mut(), 0, &mut required, info as u32)
        })?;
        let mut buffer = vec![0i8; required.max(1) as usize];
        PicoStatus::check(unsafe {
            f(
                handle,
                buffer.as_mut_ptr(),
                buffer.len() as c_short,
                &mut required,
                info as u32,
            )
        })?;
        let mut bytes: Vec<u8> = buffer.iter().map(|&b| b as u8).collect();
        bytes.retain(|&b| b != 0);
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn set_do(&mut self, handle: Handle, do_value: i16, do_number: i16) -> Result<(), PicoStatus> {
        let f: Symbol<FnSetDo> = self.symbol(b"pl1000SetDo\0")?;
        PicoStatus::check(unsafe { f(handle, do_value, do_number) })
    }

    fn set_pulse_width(
        &mut self,
        handle: Handle,
        period: u16,
        cycle: u8,
    ) -> Result<(), PicoStatus> {
        let f: Symbol<FnSetPulseWidth> = self.symbol(b"pl1000SetPulseWidth\0")?;
        PicoStatus::check(unsafe { f(handle, period, cycle) })
    }
}
