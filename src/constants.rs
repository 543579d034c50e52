//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Cost governance constants
pub mod budget {
    /// Default ceiling on average cost per stuck-scan analysis (USD)
    pub const DEFAULT_COST_CEILING_USD: f64 = 0.50;
}

/// Model family detection
pub mod models {
    /// Model-id substrings identifying the reasoning family.
    ///
    /// Reasoning models take `max_completion_tokens`, reject custom
    /// temperature, and have no dedicated system role.
    pub const REASONING_MARKERS: [&str; 3] = ["gpt-5", "o1", "o3"];

    /// Token-limit parameter name for legacy chat models
    pub const LEGACY_TOKEN_PARAM: &str = "max_tokens";

    /// Token-limit parameter name for reasoning-family models
    pub const REASONING_TOKEN_PARAM: &str = "max_completion_tokens";
}

/// Per-operation output token limits
pub mod tokens {
    /// Stuck-scan analysis responses
    pub const ANALYSIS: u32 = 2000;

    /// Finding triage responses
    pub const TRIAGE: u32 = 500;

    /// Remediation plan responses
    pub const REMEDIATION: u32 = 1000;

    /// Architecture overview responses (report + diagram code)
    pub const ARCHITECTURE: u32 = 4000;

    /// Timeout explanations
    pub const EXPLAIN: u32 = 200;

    /// Diagram repair responses
    pub const DIAGRAM_REPAIR: u32 = 4000;
}

/// Diagram sandbox constants
pub mod sandbox {
    /// Default interpreter for generated diagram scripts
    pub const DEFAULT_INTERPRETER: &str = "python3";

    /// Hard wall-clock limit for one script execution (seconds)
    pub const EXEC_TIMEOUT_SECS: u64 = 30;

    /// Filename generated scripts are instructed to write
    pub const DIAGRAM_ARTIFACT: &str = "architecture_diagram.png";

    /// Extensions accepted when falling back to any produced image
    pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "svg", "jpg", "jpeg"];
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Anthropic API version header value
    pub const ANTHROPIC_VERSION: &str = "2023-06-01";
}
