use crate::integer::IntegerStrategy;
use crate::wire::Utf8Policy;

/// Default limit on nested message depth
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Configuration for a [`MessageCodec`](super::MessageCodec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Host representation of 64-bit integers
    pub integers: IntegerStrategy,
    /// Handling of invalid UTF-8 in string fields
    pub utf8: Utf8Policy,
    /// Maximum depth of nested messages
    pub recursion_limit: usize,
    /// Emit every declared field in textual form, defaults included
    pub emit_defaults: bool,
    /// Emit enum codes instead of symbolic names in textual form
    pub enums_as_numbers: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            integers: IntegerStrategy::SafeDouble,
            utf8: Utf8Policy::Replace,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            emit_defaults: false,
            enums_as_numbers: false,
        }
    }
}

impl CodecConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the 64-bit integer strategy
    pub fn integers(mut self, strategy: IntegerStrategy) -> Self {
        self.integers = strategy;
        self
    }

    /// Sets the invalid UTF-8 policy
    pub fn utf8(mut self, policy: Utf8Policy) -> Self {
        self.utf8 = policy;
        self
    }

    /// Sets the nesting limit
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Sets whether default values are emitted in textual form
    pub fn emit_defaults(mut self, emit: bool) -> Self {
        self.emit_defaults = emit;
        self
    }

    /// Sets whether enums are emitted as numbers in textual form
    pub fn enums_as_numbers(mut self, numeric: bool) -> Self {
        self.enums_as_numbers = numeric;
        self
    }
}
