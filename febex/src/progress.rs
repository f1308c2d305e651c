//! Progress reporting for long running export steps
//!
//! Weight transfer and animation baking walk every vertex or every frame.
//! They report through a [`ProgressHandler`] passed in by the caller and poll
//! [`ProgressHandler::is_interrupted`] after each step, so a user can stop
//! them cooperatively.

use crate::error::{Error, Result};

/// Trait for receiving progress updates during export operations
pub trait ProgressHandler {
    /// Called once before a loop starts
    ///
    /// # Parameters
    /// - `max`: Number of steps the loop will take
    /// - `message`: Status message describing the work
    fn begin(&mut self, max: usize, message: &str);

    /// Advance by `amount` steps
    fn step(&mut self, amount: usize);

    /// Whether the user asked to stop
    fn is_interrupted(&self) -> bool;

    /// Called once after the loop, including when it fails
    fn end(&mut self);
}

/// Step a handler and turn an interrupt into [`Error::Cancelled`]
pub(crate) fn step_or_cancel(
    handler: &mut dyn ProgressHandler,
    amount: usize,
    operation: &str,
) -> Result<()> {
    handler.step(amount);
    if handler.is_interrupted() {
        Err(Error::cancelled(operation))
    } else {
        Ok(())
    }
}

/// Run `work` between `begin` and `end`, calling `end` on every exit path
pub(crate) fn with_progress<T, F>(
    handler: &mut dyn ProgressHandler,
    max: usize,
    message: &str,
    work: F,
) -> Result<T>
where
    F: FnOnce(&mut dyn ProgressHandler) -> Result<T>,
{
    handler.begin(max, message);
    let result = work(&mut *handler);
    handler.end();
    result
}

/// A progress handler that logs whole-percent changes
pub struct PrintProgressHandler {
    max: usize,
    current: usize,
    last_percentage: i32,
    message: String,
}

impl PrintProgressHandler {
    /// Create a new print progress handler
    pub fn new() -> Self {
        Self {
            max: 0,
            current: 0,
            last_percentage: -1,
            message: String::new(),
        }
    }
}

impl Default for PrintProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandler for PrintProgressHandler {
    fn begin(&mut self, max: usize, message: &str) {
        self.max = max;
        self.current = 0;
        self.last_percentage = -1;
        self.message = message.to_string();
        log::info!("{message}");
    }

    fn step(&mut self, amount: usize) {
        self.current = (self.current + amount).min(self.max);
        let current_percentage = if self.max == 0 {
            100
        } else {
            (self.current * 100 / self.max) as i32
        };

        // Only print when percentage changes
        if current_percentage != self.last_percentage {
            log::info!("{}: {}% complete", self.message, current_percentage);
            self.last_percentage = current_percentage;
        }
    }

    fn is_interrupted(&self) -> bool {
        false
    }

    fn end(&mut self) {
        log::debug!("{}: done", self.message);
    }
}

/// A progress handler that stores progress information without printing
#[derive(Debug, Default)]
pub struct SilentProgressHandler {
    max: usize,
    current: usize,
    message: Option<String>,
    active: bool,
    cancel_at: Option<usize>,
    cancelled: bool,
}

impl SilentProgressHandler {
    /// Create a new silent progress handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an interrupt once `steps` steps have been taken
    pub fn cancel_after(steps: usize) -> Self {
        Self {
            cancel_at: Some(steps),
            ..Self::default()
        }
    }

    /// Steps taken in the current (or last) loop
    pub fn current(&self) -> usize {
        self.current
    }

    /// Step count announced by the current (or last) loop
    pub fn max(&self) -> usize {
        self.max
    }

    /// Get the current progress fraction (0.0 to 1.0)
    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            0.0
        } else {
            self.current as f32 / self.max as f32
        }
    }

    /// Get the current progress message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether a loop is between `begin` and `end`
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Cancel the operation
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

impl ProgressHandler for SilentProgressHandler {
    fn begin(&mut self, max: usize, message: &str) {
        self.max = max;
        self.current = 0;
        self.message = Some(message.to_string());
        self.active = true;
    }

    fn step(&mut self, amount: usize) {
        self.current += amount;
        if self.cancel_at.is_some_and(|at| self.current >= at) {
            self.cancelled = true;
        }
    }

    fn is_interrupted(&self) -> bool {
        self.cancelled
    }

    fn end(&mut self) {
        self.active = false;
    }
}

/// A progress handler that calls a closure on every step
///
/// The closure receives `(current, max)` and returns `false` to interrupt.
pub struct ClosureProgressHandler<F>
where
    F: FnMut(usize, usize) -> bool,
{
    closure: F,
    max: usize,
    current: usize,
    interrupted: bool,
}

impl<F> ClosureProgressHandler<F>
where
    F: FnMut(usize, usize) -> bool,
{
    /// Create a new closure-based progress handler
    pub fn new(closure: F) -> Self {
        Self {
            closure,
            max: 0,
            current: 0,
            interrupted: false,
        }
    }
}

impl<F> ProgressHandler for ClosureProgressHandler<F>
where
    F: FnMut(usize, usize) -> bool,
{
    fn begin(&mut self, max: usize, _message: &str) {
        self.max = max;
        self.current = 0;
        self.interrupted = false;
    }

    fn step(&mut self, amount: usize) {
        self.current += amount;
        if !(self.closure)(self.current, self.max) {
            self.interrupted = true;
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    fn end(&mut self) {}
}
