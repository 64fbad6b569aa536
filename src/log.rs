/// Logs a formatted line to the browser console, or to stderr on native builds when
/// `KUMIAWASE_LOG` is set.
macro_rules! console_log {
    ($($arg:tt)*) => {{
        #[cfg(target_arch = "wasm32")]
        {
            gloo::console::log!(format!($($arg)*));
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            if $crate::log::enabled() {
                eprintln!("{}", format!($($arg)*));
            }
        }
    }};
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn enabled() -> bool {
    std::env::var_os("KUMIAWASE_LOG").is_some()
}
