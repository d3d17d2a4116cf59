use super::{
    Findmnt, Flush, HandleFlush, MountResolver, MountTableFile,
    SyncUnmountError, Umount2, UmountCommand, Unmounter,
};
use crate::config::{Config, Resolver, UnmountMethod};
use crate::util::run_with_deadline;
use anyhow::Result;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolves the mount backing a path, flushes it under a deadline and unmounts it.
pub struct SyncUnmount {
    resolver: Box<dyn MountResolver>,
    flusher: Arc<dyn Flush>,
    unmounter: Box<dyn Unmounter>,
    timeout: Duration,
    best_effort: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub mount_point: PathBuf,
    /// False only when a best-effort unmount failed.
    pub unmounted: bool,
}

impl SyncUnmount {
    pub fn new(
        resolver: Box<dyn MountResolver>,
        flusher: Arc<dyn Flush>,
        unmounter: Box<dyn Unmounter>,
    ) -> Self {
        Self {
            resolver,
            flusher,
            unmounter,
            timeout: DEFAULT_TIMEOUT,
            best_effort: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let resolver: Box<dyn MountResolver> = match config.resolver {
            Resolver::Mounts => Box::new(MountTableFile {
                table: config.mounts_file.clone(),
            }),
            Resolver::Findmnt => Box::new(Findmnt::default()),
        };
        let unmounter: Box<dyn Unmounter> = match config.unmount {
            UnmountMethod::Command => Box::new(UmountCommand {
                command: config.umount_command.clone(),
                lazy: config.lazy,
                force: config.force,
            }),
            UnmountMethod::Syscall => Box::new(Umount2 {
                lazy: config.lazy,
                force: config.force,
            }),
        };

        Self::new(
            resolver,
            Arc::new(HandleFlush {
                mode: config.sync_mode,
            }),
            unmounter,
        )
        .with_timeout(config.timeout)
        .with_best_effort(config.best_effort)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let unresolved = || SyncUnmountError::Unresolved {
            path: path.to_path_buf(),
        };

        let mount_point = self
            .resolver
            .resolve_mount_point(path)?
            .filter(|mount_point| !mount_point.as_os_str().is_empty())
            .ok_or_else(unresolved)?;

        // Either the path's own mount is already gone or the path lives on the root filesystem.
        // Both end here, whatever spelling of the path led to /.
        if mount_point == Path::new("/") {
            debug!("{} is only covered by the root filesystem", path.display());
            return Err(unresolved().into());
        }

        debug!("{} is mounted at {}", path.display(), mount_point.display());
        Ok(mount_point)
    }

    pub fn sync(&self, mount_point: &Path) -> Result<()> {
        let flusher = Arc::clone(&self.flusher);
        let target = mount_point.to_path_buf();

        debug!(
            "Flushing {} with a {}s deadline",
            mount_point.display(),
            self.timeout.as_secs_f64()
        );
        match run_with_deadline("flush", self.timeout, move || {
            flusher.flush(&target)
        })? {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(e.context(SyncUnmountError::FlushFailed {
                mount_point: mount_point.to_path_buf(),
            })),
            None => Err(SyncUnmountError::TimedOut {
                mount_point: mount_point.to_path_buf(),
                timeout: self.timeout,
            }
            .into()),
        }
    }

    /// Returns whether the mount point was unmounted. Only a best-effort run can get `false`.
    pub fn unmount(&self, mount_point: &Path) -> Result<bool> {
        match self.unmounter.unmount(mount_point) {
            Ok(()) => Ok(true),
            Err(e) if self.best_effort => {
                warn!(
                    "Ignoring failure to unmount {}: {:#}",
                    mount_point.display(),
                    e
                );
                Ok(false)
            }
            Err(e) => Err(SyncUnmountError::UnmountFailed {
                mount_point: mount_point.to_path_buf(),
                reason: format!("{:#}", e),
            }
            .into()),
        }
    }

    pub fn run(&self, path: &Path) -> Result<Outcome> {
        let mount_point = self.resolve(path)?;
        self.sync(&mount_point)?;
        info!("Flushed {}", mount_point.display());
        let unmounted = self.unmount(&mount_point)?;
        Ok(Outcome {
            mount_point,
            unmounted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Instant;

    struct FakeResolver {
        answer: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl MountResolver for FakeResolver {
        fn resolve_mount_point(&self, _path: &Path) -> Result<Option<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.map(PathBuf::from))
        }
    }

    enum FlushBehavior {
        Succeed(Duration),
        Fail,
        Hang,
    }

    struct FakeFlush {
        behavior: FlushBehavior,
        calls: Arc<AtomicUsize>,
        // Held so a hanging flush never sees its sender drop
        hang: Mutex<Option<mpsc::Receiver<()>>>,
        _hang_sender: Mutex<mpsc::Sender<()>>,
    }

    impl FakeFlush {
        fn new(behavior: FlushBehavior, calls: Arc<AtomicUsize>) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                behavior,
                calls,
                hang: Mutex::new(Some(rx)),
                _hang_sender: Mutex::new(tx),
            }
        }
    }

    impl Flush for FakeFlush {
        fn flush(&self, _mount_point: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                FlushBehavior::Succeed(delay) => {
                    std::thread::sleep(delay);
                    Ok(())
                }
                FlushBehavior::Fail => Err(anyhow!("Input/output error")),
                FlushBehavior::Hang => {
                    let rx = self.hang.lock().unwrap().take();
                    if let Some(rx) = rx {
                        let _ = rx.recv();
                    }
                    Ok(())
                }
            }
        }
    }

    struct FakeUnmounter {
        fail: bool,
        unmounted: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl Unmounter for FakeUnmounter {
        fn unmount(&self, mount_point: &Path) -> Result<()> {
            self.unmounted.lock().unwrap().push(mount_point.to_path_buf());
            if self.fail {
                Err(anyhow!("umount: target is busy"))
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        resolves: Arc<AtomicUsize>,
        flushes: Arc<AtomicUsize>,
        unmounted: Arc<Mutex<Vec<PathBuf>>>,
        sync_unmount: SyncUnmount,
    }

    fn harness(
        answer: Option<&'static str>,
        flush: FlushBehavior,
        unmount_fails: bool,
    ) -> Harness {
        let resolves = Arc::new(AtomicUsize::new(0));
        let flushes = Arc::new(AtomicUsize::new(0));
        let unmounted = Arc::new(Mutex::new(Vec::new()));
        let sync_unmount = SyncUnmount::new(
            Box::new(FakeResolver {
                answer,
                calls: resolves.clone(),
            }),
            Arc::new(FakeFlush::new(flush, flushes.clone())),
            Box::new(FakeUnmounter {
                fail: unmount_fails,
                unmounted: unmounted.clone(),
            }),
        );
        Harness {
            resolves,
            flushes,
            unmounted,
            sync_unmount,
        }
    }

    fn kind(err: &anyhow::Error) -> &SyncUnmountError {
        err.downcast_ref::<SyncUnmountError>()
            .expect("not a SyncUnmountError")
    }

    #[test]
    fn test_sync_then_unmount() {
        let h = harness(
            Some("/mnt/data"),
            FlushBehavior::Succeed(Duration::from_millis(20)),
            false,
        );
        let outcome = h
            .sync_unmount
            .with_timeout(Duration::from_secs(5))
            .run(Path::new("/mnt/data/file.txt"))
            .unwrap();

        assert_eq!(
            outcome,
            Outcome {
                mount_point: PathBuf::from("/mnt/data"),
                unmounted: true,
            }
        );
        assert_eq!(h.resolves.load(Ordering::SeqCst), 1);
        assert_eq!(h.flushes.load(Ordering::SeqCst), 1);
        assert_eq!(
            *h.unmounted.lock().unwrap(),
            vec![PathBuf::from("/mnt/data")]
        );
    }

    #[test]
    fn test_unresolved_touches_nothing() {
        let h = harness(None, FlushBehavior::Succeed(Duration::ZERO), false);
        let err = h.sync_unmount.run(Path::new("/nonexistent")).unwrap_err();

        assert!(matches!(kind(&err), SyncUnmountError::Unresolved { .. }));
        assert_eq!(h.flushes.load(Ordering::SeqCst), 0);
        assert!(h.unmounted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_answer_is_unresolved() {
        let h = harness(Some(""), FlushBehavior::Succeed(Duration::ZERO), false);
        let err = h.sync_unmount.run(Path::new("/mnt/data")).unwrap_err();
        assert!(matches!(kind(&err), SyncUnmountError::Unresolved { .. }));
        assert_eq!(h.flushes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_root_filesystem_is_never_a_target() {
        for path in ["/mnt/data", "/", "/.", "/tmp/.."] {
            let h =
                harness(Some("/"), FlushBehavior::Succeed(Duration::ZERO), false);
            let err = h.sync_unmount.run(Path::new(path)).unwrap_err();
            assert!(
                matches!(kind(&err), SyncUnmountError::Unresolved { .. }),
                "{}",
                path
            );
            assert_eq!(h.flushes.load(Ordering::SeqCst), 0);
            assert!(h.unmounted.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn test_repeated_runs_on_unmounted_path_fail_the_same_way() {
        for _ in 0..2 {
            let h = harness(None, FlushBehavior::Succeed(Duration::ZERO), false);
            let err = h.sync_unmount.run(Path::new("/mnt/data")).unwrap_err();
            assert!(matches!(kind(&err), SyncUnmountError::Unresolved { .. }));
            assert!(h.unmounted.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn test_hanging_flush_times_out_without_unmount() {
        let h = harness(Some("/mnt/data"), FlushBehavior::Hang, false);
        let start = Instant::now();
        let err = h
            .sync_unmount
            .with_timeout(Duration::from_millis(100))
            .run(Path::new("/mnt/data/file.txt"))
            .unwrap_err();

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(matches!(kind(&err), SyncUnmountError::TimedOut { .. }));
        assert!(err.to_string().starts_with("fsync timed out"));
        assert_eq!(h.flushes.load(Ordering::SeqCst), 1);
        assert!(h.unmounted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_flush_failure_skips_unmount() {
        let h = harness(Some("/mnt/data"), FlushBehavior::Fail, false);
        let err = h.sync_unmount.run(Path::new("/mnt/data")).unwrap_err();

        assert!(matches!(kind(&err), SyncUnmountError::FlushFailed { .. }));
        assert!(format!("{:#}", err).contains("Input/output error"));
        assert!(h.unmounted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unmount_failure_is_reported() {
        let h = harness(
            Some("/mnt/data"),
            FlushBehavior::Succeed(Duration::ZERO),
            true,
        );
        let err = h.sync_unmount.run(Path::new("/mnt/data")).unwrap_err();

        match kind(&err) {
            SyncUnmountError::UnmountFailed {
                mount_point,
                reason,
            } => {
                assert_eq!(mount_point, Path::new("/mnt/data"));
                assert!(reason.contains("target is busy"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(h.unmounted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_best_effort_unmount_failure_succeeds() {
        let h = harness(
            Some("/mnt/data"),
            FlushBehavior::Succeed(Duration::ZERO),
            true,
        );
        let outcome = h
            .sync_unmount
            .with_best_effort(true)
            .run(Path::new("/mnt/data"))
            .unwrap();

        assert!(!outcome.unmounted);
        assert_eq!(h.unmounted.lock().unwrap().len(), 1);
    }
}
