use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/**
 * Logs to stderr. Until `print_deferred` is called, records are held back so that messages emitted
 * while the config is being resolved can still be filtered by the level that config ends up
 * choosing.
 */
pub struct SyncUnmountLogger {
    level: Mutex<LevelFilter>,
    output: Mutex<Box<dyn Write + Send>>,
    deferred: Mutex<Vec<(Level, ColoredString)>>,
    defer_output: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SyncUnmountLogger {
    pub fn new(level: LevelFilter) -> &'static Self {
        Box::leak(Box::new(Self::with_output(level, Box::new(io::stderr()))))
    }

    fn with_output(level: LevelFilter, output: Box<dyn Write + Send>) -> Self {
        Self {
            level: Mutex::new(level),
            output: Mutex::new(output),
            deferred: Mutex::new(Vec::new()),
            defer_output: AtomicBool::new(true),
        }
    }

    pub fn init(&'static self) -> Result<&'static Self, log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(LevelFilter::Trace);
        Ok(self)
    }

    pub fn set_level(&self, level: LevelFilter) {
        *lock(&self.level) = level;
    }

    pub fn print_deferred(&self) {
        let deferred = std::mem::take(&mut *lock(&self.deferred));
        let level_filter = *lock(&self.level);
        {
            let mut output = lock(&self.output);
            for (level, message) in deferred.iter() {
                if *level <= level_filter {
                    let _ = writeln!(output, "{}", message);
                }
            }
        }
        self.defer_output.store(false, Ordering::SeqCst);
    }

    fn format(record: &Record) -> ColoredString {
        let color = match record.level() {
            Level::Error => colored::Color::Red,
            Level::Warn => colored::Color::Yellow,
            Level::Info => colored::Color::White,
            Level::Debug => colored::Color::Blue,
            Level::Trace => colored::Color::BrightBlack,
        };
        let level_str = format!("{:<5}", record.level().to_string()).color(color);
        format!("[{}] {}: {}", level_str, record.target(), record.args())
            .color(color)
    }
}

impl Log for SyncUnmountLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *lock(&self.level)
    }

    fn log(&self, record: &Record) {
        if self.defer_output.load(Ordering::SeqCst) {
            lock(&self.deferred).push((record.level(), Self::format(record)));
        } else if self.enabled(record.metadata()) {
            let _ = writeln!(lock(&self.output), "{}", Self::format(record));
        }
    }

    fn flush(&self) {
        let _ = lock(&self.output).flush();
    }
}
