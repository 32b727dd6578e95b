//! Machine configuration

/// Default number of stack slots reserved up front
pub const DEFAULT_STACK_SIZE: usize = 1000;

/// Default hard limit on stack slots
pub const DEFAULT_MAX_STACK_SIZE: usize = 1 << 20;

/// Sizing and tracing options of a [`crate::StackMachine`]
///
/// # Examples
///
/// ```
/// use interpreter::MachineConfig;
///
/// let config = MachineConfig::default().with_stack_size(64).with_trace(true);
/// assert_eq!(config.stack_size, 64);
/// assert!(config.trace);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Slots reserved when the machine is created, the stack grows past it on demand
    pub stack_size: usize,
    /// Growing past this many slots is a stack overflow
    pub max_stack_size: usize,
    /// Log every dispatched instruction at trace level
    pub trace: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            trace: false,
        }
    }
}

impl MachineConfig {
    /// Set the initial stack reservation
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        if self.max_stack_size < stack_size {
            self.max_stack_size = stack_size;
        }
        self
    }

    /// Set the stack limit
    pub fn with_max_stack_size(mut self, max_stack_size: usize) -> Self {
        self.max_stack_size = max_stack_size;
        self
    }

    /// Enable or disable instruction tracing
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
