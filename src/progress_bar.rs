pub use crate::traits::Progress;

use log::LevelFilter;

impl Progress for indicatif::ProgressBar {
    fn inc(&self, i: u64) {
        indicatif::ProgressBar::inc(self, i)
    }

    fn finish(&self) {
        indicatif::ProgressBar::finish(self)
    }
}

impl Progress for logbar::ProgressBar {
    fn inc(&self, i: u64) {
        logbar::ProgressBar::inc(self, i as usize)
    }

    fn finish(&self) {
        logbar::ProgressBar::finish(self)
    }
}

/// Dummy progress indicator
pub struct NoProgress {}
impl Progress for NoProgress {
    fn inc(&self, _i: u64) {}

    fn finish(&self) {}
}

/// Don't show any progress indicator
pub const NO_PROGRESS: NoProgress = NoProgress {};

/// Progress of the event loop
///
/// On an interactive terminal this is an `indicatif` bar, or a
/// spinner if the number of events is not known in advance. Otherwise
/// `logbar` is used if the number of events is known. Logging is
/// suspended while the bar is shown.
pub struct ProgressBar {
    bar: Box<dyn Progress>,
    suspended_log_level: Option<LevelFilter>,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            bar: Box::new(NO_PROGRESS),
            suspended_log_level: None,
        }
    }
}

impl Progress for ProgressBar {
    fn inc(&self, i: u64) {
        self.bar.inc(i);
    }

    fn finish(&self) {
        self.bar.finish();
        if let Some(level) = self.suspended_log_level {
            log::set_max_level(level);
        }
    }
}

impl ProgressBar {
    /// A new progress indicator for `len` events, if known
    pub fn new(len: Option<u64>, message: &str) -> Self {
        if log::max_level() != LevelFilter::Info {
            return ProgressBar::default();
        }
        let bar: Box<dyn Progress> = if console::Term::stderr().features().is_attended() {
            Box::new(indicatif_bar(len, message))
        } else if let Some(len) = len {
            let style = logbar::Style::new().indicator('█');
            eprintln!("{message}");
            Box::new(logbar::ProgressBar::with_style(len as usize, style))
        } else {
            return ProgressBar::default();
        };
        let level = log::max_level();
        log::set_max_level(LevelFilter::Off);
        ProgressBar {
            bar,
            suspended_log_level: Some(level),
        }
    }
}

fn indicatif_bar(len: Option<u64>, message: &str) -> indicatif::ProgressBar {
    let (bar, template) = match len {
        Some(len) => (
            indicatif::ProgressBar::new(len),
            "{bar:60.cyan/cyan} {msg} {pos}/{len} [{elapsed}]",
        ),
        None => (
            indicatif::ProgressBar::new_spinner(),
            "{spinner:.cyan} {msg} {pos} [{elapsed}]",
        ),
    };
    if let Ok(style) = indicatif::ProgressStyle::default_bar().template(template) {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar
}
