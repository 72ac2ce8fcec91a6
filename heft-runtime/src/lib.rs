//! Runtime plumbing for heft: the Tokio runtime, process-wide cancellation,
//! and upstream pacing ([`rate`], [`throttle`]).
use anyhow::Result;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod rate;
pub mod throttle;

pub use rate::{Quota, RateError, RateLimiter};
pub use throttle::{Throttle, ThrottlePermit};

#[derive(Clone)]
pub struct HeftHandle {
    inner: Handle,
    cancel: Arc<CancellationToken>,
}

pub struct HeftRuntime {
    runtime: Runtime,
    cancel: Arc<CancellationToken>,
}

impl HeftRuntime {
    /// Build a multi-threaded Tokio runtime.
    ///
    /// ```
    /// use heft_runtime::HeftRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = HeftRuntime::build("doctest-runtime", Some(1)).expect("runtime builds");
    /// assert_eq!(runtime.block_on(async { 2 + 2 }), 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);
        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }
        Ok(Self {
            runtime: builder.build()?,
            cancel: Arc::new(CancellationToken::new()),
        })
    }

    pub fn handle(&self) -> HeftHandle {
        HeftHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and shut the runtime down.
    pub fn shutdown(self, graceful: std::time::Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl HeftHandle {
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// The shared token every pipeline run listens to.
    ///
    /// ```
    /// use heft_runtime::HeftRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = HeftRuntime::build("cancel-example", Some(1)).unwrap();
    /// let cancel = runtime.handle().cancellation();
    /// assert!(!cancel.is_cancelled());
    /// runtime.shutdown(Duration::from_millis(5));
    /// assert!(cancel.is_cancelled());
    /// ```
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Cancel the shared token on the first Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("ctrl-c received, cancelling run");
                cancel.cancel();
            }
        })
    }
}
