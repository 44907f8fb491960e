#![forbid(unsafe_code)]
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod dom;
pub mod handle;
pub mod loader;
pub mod logger;
pub mod remote;
pub mod storage;

pub use handle::ProgressHandle;
pub use loader::{WebCatalogLoader, WebDataError};
pub use remote::{FetchRemote, WebRemoteError, fetch_completion, fetch_remote_record};
pub use storage::{LocalStore, WebStorageError};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    logger::init(level);
    log::info!("cryptotrace web shell ready");
}
