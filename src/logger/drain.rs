use lazy_static::lazy_static;
use slog::{Drain, OwnedKVList, Record};

lazy_static! {
    static ref GLOBAL_LOG_GUARD: (slog_scope::GlobalLoggerGuard, bool) = {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator)
            .use_file_location()
            .build()
            .fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        let logger = slog::Logger::root(LevelDrain(drain), slog::slog_o!());

        let scope_guard = slog_scope::set_global_logger(logger);
        // Fails only if another `log` backend is already installed.
        let log_installed = slog_stdlog::init().is_ok();
        (scope_guard, log_installed)
    };
}

/// Installs the terminal logger as the global `slog` logger and routes
/// `log` records into it. Safe to call more than once.
pub fn init() {
    lazy_static::initialize(&GLOBAL_LOG_GUARD);
}

/// Drops records below the process-wide level set by `set_log_level`.
pub struct LevelDrain<D>(pub D);

impl<D: Drain<Ok = ()>> Drain for LevelDrain<D> {
    type Ok = ();
    type Err = D::Err;

    fn log(&self, record: &Record, values: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        match super::get_log_level() {
            Some(level) if !record.level().is_at_least(level) => Ok(()),
            _ => self.0.log(record, values),
        }
    }
}
