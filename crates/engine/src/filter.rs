//! Call filter predicate
//!
//! Grouping only lets calls the filter accepts head a group. The default
//! filter hides the same noise the trace viewer hides by default.

use crate::call::Call;

/// Predicate deciding which calls may head a group
pub trait CallFilter: Send + Sync {
    /// Is `call` visible?
    fn accepts(&self, call: &Call) -> bool;
}

/// Filter that accepts every call
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl CallFilter for AcceptAll {
    fn accepts(&self, _call: &Call) -> bool {
        true
    }
}

/// Which call families the default filter hides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Proc-address resolution (`glXGetProcAddress`, `wglGetProcAddress`)
    pub resolutions: bool,
    /// Error queries (`glGetError`)
    pub errors: bool,
    /// Window-system state queries (`glXGetCurrentDisplay`, `wglDescribePixelFormat`)
    pub extra_state: bool,
    /// Extension string queries (`glXGetClientString`, `glXQueryExtensionsString`, `glGetString`)
    pub extensions: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            resolutions: true,
            errors: true,
            extra_state: true,
            extensions: true,
        }
    }
}

impl FilterOptions {
    /// Hide nothing
    pub fn none() -> Self {
        FilterOptions {
            resolutions: false,
            errors: false,
            extra_state: false,
            extensions: false,
        }
    }
}

const RESOLUTIONS: &[&str] = &["glXGetProcAddress", "wglGetProcAddress"];
const ERRORS: &[&str] = &["glGetError"];
const EXTRA_STATE: &[&str] = &["glXGetCurrentDisplay", "wglDescribePixelFormat"];
const EXTENSIONS: &[&str] = &["glXGetClientString", "glXQueryExtensionsString", "glGetString"];

/// Name-based filter with the viewer's default exclusions
#[derive(Debug, Clone, Default)]
pub struct DefaultCallFilter {
    options: FilterOptions,
    custom_exclude: Option<String>,
}

impl DefaultCallFilter {
    /// Filter with the given families hidden
    pub fn new(options: FilterOptions) -> Self {
        DefaultCallFilter {
            options,
            custom_exclude: None,
        }
    }

    /// Also hide calls whose name contains `pattern`
    pub fn with_custom_exclude(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.custom_exclude = if pattern.is_empty() { None } else { Some(pattern) };
        self
    }

    /// Active options
    pub fn options(&self) -> FilterOptions {
        self.options
    }

    /// Test a bare function name
    pub fn accepts_name(&self, name: &str) -> bool {
        let hidden = |set: &[&str]| set.iter().any(|p| name.contains(p));
        if self.options.resolutions && hidden(RESOLUTIONS) {
            return false;
        }
        if self.options.errors && hidden(ERRORS) {
            return false;
        }
        if self.options.extra_state && hidden(EXTRA_STATE) {
            return false;
        }
        if self.options.extensions && hidden(EXTENSIONS) {
            return false;
        }
        match &self.custom_exclude {
            Some(pattern) => !name.contains(pattern.as_str()),
            None => true,
        }
    }
}

impl CallFilter for DefaultCallFilter {
    fn accepts(&self, call: &Call) -> bool {
        self.accepts_name(call.name())
    }
}
