//! Binding to the INSTEAD library and the metaparser shim.
//!
//! Both libraries keep their state in C globals, so at most one
//! [`NativeInterpreter`] may be live in a process and it must stay on the
//! thread that created it. The type is deliberately `!Send`; build it inside the
//! factory passed to [`crate::executor::SessionHandle::spawn`].

use std::ffi::{CStr, CString, c_char, c_int};
use std::marker::PhantomData;
use std::path::Path;
use std::ptr;

use log::warn;

use crate::interpreter::Interpreter;

#[link(name = "instead")]
unsafe extern "C" {
    fn instead_init(game_dir: *const c_char) -> c_int;
    fn instead_load(info: *mut *mut c_char) -> c_int;
    fn instead_cmd(cmd: *mut c_char, rc: *mut c_int) -> *mut c_char;
    fn instead_err() -> *const c_char;
    fn instead_done();
    fn setdir(path: *const c_char) -> c_int;
}

#[link(name = "metaparser")]
unsafe extern "C" {
    fn metaparser_register_extension() -> c_int;
    fn metaparser_is_restart() -> c_int;
    fn metaparser_is_save() -> c_int;
    fn metaparser_is_load() -> c_int;
}

#[derive(Debug, Default)]
pub struct NativeInterpreter {
    /// Error raised on the Rust side of the boundary, reported before `instead_err`.
    local_error: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl NativeInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    fn c_string(&mut self, what: &str, value: &str) -> Option<CString> {
        match CString::new(value) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("{what} contains a NUL byte: {err}");
                self.local_error = Some(format!("{what} contains a NUL byte"));
                None
            },
        }
    }

    fn c_path(&mut self, what: &str, path: &Path) -> Option<CString> {
        self.c_string(what, &path.to_string_lossy())
    }
}

impl Interpreter for NativeInterpreter {
    fn register_extension(&mut self) -> i32 {
        unsafe { metaparser_register_extension() }
    }

    fn init(&mut self, storage_root: &Path, game_dir: &Path) -> i32 {
        let (Some(root), Some(game)) = (
            self.c_path("storage root", storage_root),
            self.c_path("game directory", game_dir),
        ) else {
            return -1;
        };
        unsafe {
            setdir(root.as_ptr());
            instead_init(game.as_ptr())
        }
    }

    fn load(&mut self) -> i32 {
        unsafe { instead_load(ptr::null_mut()) }
    }

    fn command(&mut self, cmd: &str) -> Option<String> {
        let mut buf = self.c_string("command", cmd)?.into_bytes_with_nul();
        let mut rc: c_int = 0;
        let raw = unsafe { instead_cmd(buf.as_mut_ptr().cast(), &raw mut rc) };
        if raw.is_null() {
            return None;
        }
        let response = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { libc::free(raw.cast()) };
        self.local_error = None;
        Some(response)
    }

    fn last_error(&mut self) -> String {
        if let Some(err) = self.local_error.take() {
            return err;
        }
        let raw = unsafe { instead_err() };
        if raw.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()
        }
    }

    fn done(&mut self) {
        unsafe { instead_done() }
    }

    fn restart_requested(&mut self) -> bool {
        unsafe { metaparser_is_restart() != 0 }
    }

    fn save_requested(&mut self) -> bool {
        unsafe { metaparser_is_save() != 0 }
    }

    fn load_requested(&mut self) -> bool {
        unsafe { metaparser_is_load() != 0 }
    }
}
