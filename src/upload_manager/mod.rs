pub mod core;
pub mod pipeline;
pub mod request;
pub mod session;

use std::sync::{Mutex, MutexGuard};

pub use self::core::{QueueSnapshot, UploadQueue};
pub use pipeline::Phase;
pub use request::{FileHandle, RequestObserver, RequestState};
pub use session::{QuotaSnapshot, Session};

/// 锁中毒后继续使用内部数据；队列状态在任何 panic 点上都保持一致。
pub(crate) fn recover_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poison) => {
            log::warn!("state lock poisoned; recovering");
            poison.into_inner()
        }
    }
}
