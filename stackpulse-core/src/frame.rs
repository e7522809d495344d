//! Frame introspection and identity encoding
//!
//! The host runtime is decoupled behind the [`RuntimeFrame`] trait: the
//! sampler never touches a native frame representation, only this minimal
//! view of it. [`frame_identity`] produces the packed string identity used
//! to label samples.
//!
//! ## Identity format
//!
//! ```text
//! <code-name> NUL <filename> NUL <first-line> [ SOH <tag> <value> ]*
//! ```
//!
//! with attribute tags `c` (enclosing class name), `l` (current line
//! number) and `h` (hidden flag, value `1`). The packed form is cheap to
//! produce at high sampling rates and usable directly as a grouping key by
//! downstream aggregators, without a separate structured type.

use std::fmt;

/// Why the runtime delivered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Call,
    Exception,
    Line,
    Return,
    NativeCall,
    NativeException,
    NativeReturn,
    /// Synthesized by the sampler when the tracked context-local value
    /// changes; never delivered by the host runtime itself.
    ContextChanged,
}

impl EventKind {
    /// The conventional lower-case event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Exception => "exception",
            Self::Line => "line",
            Self::Return => "return",
            Self::NativeCall => "c_call",
            Self::NativeException => "c_exception",
            Self::NativeReturn => "c_return",
            Self::ContextChanged => "context_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a foreign function named by a native call/return/exception
/// event. Native code units have no source location of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSymbol {
    pub qualname: String,
}

impl NativeSymbol {
    #[must_use]
    pub fn new(qualname: impl Into<String>) -> Self {
        Self { qualname: qualname.into() }
    }
}

/// The value bound to a frame's first parameter, as far as identity
/// encoding cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstParam {
    /// An ordinary value; carries the name of its runtime type.
    Instance { class_name: String },
    /// A type object, as conventionally bound to a `cls` parameter.
    Class { name: String },
}

/// Marker local that hides a frame from trace display.
pub const TRACEBACK_HIDE_LOCAL: &str = "__tracebackhide__";

/// Minimal view of one live invocation, as exposed by the host runtime.
///
/// Everything here must be cheap except [`first_param`](Self::first_param),
/// which may be arbitrarily expensive (it reads a live local variable). The
/// encoder only invokes it after [`first_arg_name`](Self::first_arg_name)
/// matched the `self`/`cls` convention, so the cheap check always runs
/// before the expensive resolution.
pub trait RuntimeFrame {
    /// Name of the executing code unit.
    fn code_name(&self) -> &str;

    /// Source file of the code unit.
    fn filename(&self) -> &str;

    /// First line of the code unit in its source file.
    fn first_line(&self) -> u32;

    /// Line currently executing, when the runtime knows it.
    fn current_line(&self) -> Option<u32> {
        None
    }

    /// True for code units that can suspend and resume (coroutines and
    /// generator-like constructs).
    fn is_suspend_point(&self) -> bool {
        false
    }

    /// Declared name of the first parameter, if the code unit has one.
    fn first_arg_name(&self) -> Option<&str> {
        None
    }

    /// Resolve the value bound to the first parameter. `None` when the
    /// value is unavailable, for example because the variable was deleted.
    fn first_param(&self) -> Option<FirstParam> {
        None
    }

    /// Whether `name` is declared among the frame's local variables.
    fn declares_local(&self, name: &str) -> bool {
        let _ = name;
        false
    }

    /// The invoking frame, if any.
    fn parent(&self) -> Option<&dyn RuntimeFrame> {
        None
    }
}

const FIELD_SEP: char = '\x00';
const ATTR_MARK: char = '\x01';

/// Packed frame identity string. See the module docs for the layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(String);

impl FrameId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Identity without attributes, used for whole-stack entries.
    #[must_use]
    pub fn plain(name: &str, filename: &str, first_line: u32) -> Self {
        Self(format!("{name}\x00{filename}\x00{first_line}"))
    }

    /// Identity of a native code unit.
    #[must_use]
    pub fn native(qualname: &str) -> Self {
        Self(format!("{qualname}\x00<built-in>\x000"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Encode the identity the sampler uses to label a sample of `frame`.
///
/// Deterministic and side-effect-free with respect to program semantics.
/// Usable standalone, e.g. to label a frame the same way the sampler
/// would, outside the hot path.
#[must_use]
pub fn frame_identity(frame: &dyn RuntimeFrame) -> FrameId {
    let mut raw = String::with_capacity(64);
    raw.push_str(frame.code_name());
    raw.push(FIELD_SEP);
    raw.push_str(frame.filename());
    raw.push(FIELD_SEP);
    raw.push_str(&frame.first_line().to_string());

    if let Some(class_name) = class_name_of(frame) {
        raw.push(ATTR_MARK);
        raw.push('c');
        raw.push_str(&class_name);
    }
    if let Some(line) = frame.current_line().filter(|&line| line >= 1) {
        raw.push(ATTR_MARK);
        raw.push('l');
        raw.push_str(&line.to_string());
    }
    if frame.declares_local(TRACEBACK_HIDE_LOCAL) {
        raw.push(ATTR_MARK);
        raw.push('h');
        raw.push('1');
    }
    FrameId(raw)
}

/// Enclosing-type name for the frame, resolved only when the first
/// parameter follows the `self`/`cls` convention. Any failure to resolve
/// means "no class name", never an error.
fn class_name_of(frame: &dyn RuntimeFrame) -> Option<String> {
    match frame.first_arg_name()? {
        "self" => match frame.first_param()? {
            FirstParam::Instance { class_name } => Some(class_name),
            FirstParam::Class { .. } => None,
        },
        "cls" => match frame.first_param()? {
            FirstParam::Class { name } => Some(name),
            FirstParam::Instance { .. } => None,
        },
        _ => None,
    }
}

/// Human-readable one-line description of a frame, for error context.
#[must_use]
pub fn describe(frame: &dyn RuntimeFrame) -> String {
    format!("{} ({}:{})", frame.code_name(), frame.filename(), frame.first_line())
}

/// Owned frame data for host adapters that deliver events as snapshots
/// rather than live frame references. Also the frame type used throughout
/// the test suites.
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    code_name: String,
    filename: String,
    first_line: u32,
    current_line: Option<u32>,
    suspend_point: bool,
    /// Declared parameter names, in order.
    params: Vec<String>,
    /// Other declared locals.
    locals: Vec<String>,
    first_param: Option<FirstParam>,
    parent: Option<Box<FrameSnapshot>>,
}

impl FrameSnapshot {
    #[must_use]
    pub fn new(code_name: impl Into<String>, filename: impl Into<String>, first_line: u32) -> Self {
        Self {
            code_name: code_name.into(),
            filename: filename.into(),
            first_line,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_current_line(mut self, line: u32) -> Self {
        self.current_line = Some(line);
        self
    }

    /// Mark the code unit as able to suspend and resume.
    #[must_use]
    pub fn with_suspend_point(mut self) -> Self {
        self.suspend_point = true;
        self
    }

    /// Declare a parameter. Parameters are also locals for
    /// [`RuntimeFrame::declares_local`].
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    /// Declare a non-parameter local variable.
    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>) -> Self {
        self.locals.push(name.into());
        self
    }

    /// Record the value bound to the first parameter.
    #[must_use]
    pub fn with_first_param(mut self, value: FirstParam) -> Self {
        self.first_param = Some(value);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: FrameSnapshot) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }
}

impl RuntimeFrame for FrameSnapshot {
    fn code_name(&self) -> &str {
        &self.code_name
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn first_line(&self) -> u32 {
        self.first_line
    }

    fn current_line(&self) -> Option<u32> {
        self.current_line
    }

    fn is_suspend_point(&self) -> bool {
        self.suspend_point
    }

    fn first_arg_name(&self) -> Option<&str> {
        self.params.first().map(String::as_str)
    }

    fn first_param(&self) -> Option<FirstParam> {
        self.first_param.clone()
    }

    fn declares_local(&self, name: &str) -> bool {
        self.params.iter().any(|local| local == name) || self.locals.iter().any(|local| local == name)
    }

    fn parent(&self) -> Option<&dyn RuntimeFrame> {
        self.parent.as_deref().map(|parent| parent as &dyn RuntimeFrame)
    }
}
