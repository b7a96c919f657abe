//! Registration-time method declarations
//!
//! Host types describe their script-callable surface once, in a static
//! [`ClassDecl`]. The generator reads these declarations instead of
//! inspecting types at runtime:
//!
//! ```ignore
//! static SPEAKER: Lazy<ClassDecl> = Lazy::new(|| {
//!     ClassDecl::new::<Speaker>("Speaker").method(
//!         MethodDecl::instance("playNote", |call| {
//!             let speaker = call.receiver::<Speaker>()?;
//!             speaker.play(&call.string(0)?, call.opt_number(1)?)
//!         })
//!         .param(ParamType::String)
//!         .param(ParamType::optional(ParamType::Number)),
//!     )
//! });
//! ```
//!
//! Generic extension methods live in a [`GenericSource`]: static methods
//! taking the receiver as their first parameter, offered to every class
//! carrying the source's target tag.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use smallvec::{smallvec, SmallVec};

use crate::runtime::arguments::{Arguments, EnumDecl};
use crate::runtime::error::{CallResult, ErrorKind, MethodError};
use crate::runtime::method_result::MethodResult;
use crate::runtime::value::{Table, Value};

/// A host object methods are invoked on
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A context value handed to every method of a generator
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Erased method body
pub type MethodBody = dyn Fn(&Invocation) -> CallResult<MethodResult> + Send + Sync;

static NEXT_METHOD_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one declared method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u64);

impl MethodId {
    fn next() -> Self {
        MethodId(NEXT_METHOD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Conversion of `Arc<T>` into an erased [`Instance`]
pub trait AsInstance {
    fn as_instance(self: Arc<Self>) -> Instance;
}

impl<T: Any + Send + Sync> AsInstance for T {
    fn as_instance(self: Arc<Self>) -> Instance {
        self
    }
}

/// A host type with a method declaration
pub trait Declared: AsInstance + Any + Send + Sync {
    fn declaration(&self) -> &'static ClassDecl;
}

// ============================================================================
// Types
// ============================================================================

/// A context parameter type
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ContextType {
    id: TypeId,
    name: &'static str,
}

impl ContextType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ContextType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Declared type of a method parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    /// The object the method is called on
    Receiver,
    /// One of the generator's context values
    Context(ContextType),
    /// Every remaining script argument
    Arguments,
    String,
    Number,
    Int,
    Bool,
    Table,
    /// Any value, nil included
    Any,
    /// Enum constant given by name
    Enum(&'static EnumDecl),
    /// Missing or mismatched arguments bind as absent
    Optional(Box<ParamType>),
    /// A type the bridge cannot marshal
    Other(&'static str),
}

impl ParamType {
    pub fn context<T: Any>() -> Self {
        ParamType::Context(ContextType::of::<T>())
    }

    pub fn optional(inner: ParamType) -> Self {
        ParamType::Optional(Box::new(inner))
    }
}

impl fmt::Display for ParamType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ParamType::Receiver => f.write_str("receiver"),
            ParamType::Context(ty) => f.write_str(ty.name()),
            ParamType::Arguments => f.write_str("arguments"),
            ParamType::String => f.write_str("string"),
            ParamType::Number => f.write_str("number"),
            ParamType::Int => f.write_str("integer"),
            ParamType::Bool => f.write_str("boolean"),
            ParamType::Table => f.write_str("table"),
            ParamType::Any => f.write_str("value"),
            ParamType::Enum(decl) => f.write_str(decl.name),
            ParamType::Optional(inner) => write!(f, "optional {}", inner),
            ParamType::Other(name) => f.write_str(name),
        }
    }
}

/// Declared return type of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Unit,
    Value,
    Values,
    MethodResult,
}

/// Failure type a method declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throws {
    Nothing,
    MethodError,
    Other(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Instance,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Return value of a method body
pub trait IntoReturn: 'static {
    const KIND: ReturnType;

    fn into_result(self) -> MethodResult;
}

impl IntoReturn for () {
    const KIND: ReturnType = ReturnType::Unit;

    fn into_result(self) -> MethodResult {
        MethodResult::of()
    }
}

impl IntoReturn for Vec<Value> {
    const KIND: ReturnType = ReturnType::Values;

    fn into_result(self) -> MethodResult {
        MethodResult::values(self)
    }
}

impl IntoReturn for MethodResult {
    const KIND: ReturnType = ReturnType::MethodResult;

    fn into_result(self) -> MethodResult {
        self
    }
}

macro_rules! single_value_return {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoReturn for $ty {
                const KIND: ReturnType = ReturnType::Value;

                fn into_result(self) -> MethodResult {
                    MethodResult::value(self)
                }
            }
        )*
    };
}

single_value_return!(Value, bool, i64, i32, u32, usize, f64, String, Arc<str>);

impl<T: Into<Value> + 'static> IntoReturn for Option<T> {
    const KIND: ReturnType = ReturnType::Value;

    fn into_result(self) -> MethodResult {
        MethodResult::value(self)
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// A parameter after binding
#[derive(Clone)]
pub enum BoundArg {
    Receiver(Instance),
    Context(ContextValue),
    Arguments(Arguments),
    String(Arc<str>),
    Number(f64),
    Int(i64),
    Bool(bool),
    Table(Arc<Table>),
    Any(Value),
    Enum(usize),
    /// Optional parameter with nothing usable at its position
    Absent,
}

impl BoundArg {
    fn kind(&self) -> &'static str {
        match self {
            BoundArg::Receiver(_) => "receiver",
            BoundArg::Context(_) => "context",
            BoundArg::Arguments(_) => "arguments",
            BoundArg::String(_) => "string",
            BoundArg::Number(_) => "number",
            BoundArg::Int(_) => "integer",
            BoundArg::Bool(_) => "boolean",
            BoundArg::Table(_) => "table",
            BoundArg::Any(_) => "value",
            BoundArg::Enum(_) => "enum",
            BoundArg::Absent => "absent",
        }
    }
}

impl fmt::Debug for BoundArg {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// What a method body sees: its receiver and its bound parameters, by
/// declared position.
#[derive(Debug)]
pub struct Invocation {
    receiver: Instance,
    params: SmallVec<[BoundArg; 4]>,
}

macro_rules! bound_accessors {
    ($($name:ident, $opt:ident, $variant:ident, $ty:ty;)*) => {
        $(
            pub fn $name(
                &self,
                param: usize,
            ) -> CallResult<$ty> {
                match self.param(param)? {
                    BoundArg::$variant(v) => Ok(v.clone()),
                    other => Err(Self::mismatch(param, stringify!($variant), other)),
                }
            }

            pub fn $opt(
                &self,
                param: usize,
            ) -> CallResult<Option<$ty>> {
                match self.param(param)? {
                    BoundArg::$variant(v) => Ok(Some(v.clone())),
                    BoundArg::Absent => Ok(None),
                    other => Err(Self::mismatch(param, stringify!($variant), other)),
                }
            }
        )*
    };
}

impl Invocation {
    pub(crate) fn new(
        receiver: Instance,
        params: SmallVec<[BoundArg; 4]>,
    ) -> Self {
        Self { receiver, params }
    }

    /// The object the method was invoked on
    pub fn receiver<T: Any>(&self) -> CallResult<&T> {
        self.receiver.downcast_ref::<T>().ok_or_else(|| {
            ErrorKind::HostFault(format!("receiver is not a {}", std::any::type_name::<T>())).into()
        })
    }

    /// The raw receiver
    pub fn instance(&self) -> &Instance {
        &self.receiver
    }

    /// A bound context parameter
    pub fn context<T: Any>(
        &self,
        param: usize,
    ) -> CallResult<&T> {
        match self.param(param)? {
            BoundArg::Context(ctx) | BoundArg::Receiver(ctx) => ctx.downcast_ref::<T>().ok_or_else(|| {
                ErrorKind::HostFault(format!(
                    "parameter {} is not a {}",
                    param,
                    std::any::type_name::<T>()
                ))
                .into()
            }),
            other => Err(Self::mismatch(param, "Context", other)),
        }
    }

    /// A bound context parameter, as a shared handle
    pub fn context_arc<T: Any + Send + Sync>(
        &self,
        param: usize,
    ) -> CallResult<Arc<T>> {
        match self.param(param)? {
            BoundArg::Context(ctx) | BoundArg::Receiver(ctx) => ctx.clone().downcast::<T>().map_err(|_| {
                ErrorKind::HostFault(format!(
                    "parameter {} is not a {}",
                    param,
                    std::any::type_name::<T>()
                ))
                .into()
            }),
            other => Err(Self::mismatch(param, "Context", other)),
        }
    }

    /// A bound argument-list parameter
    pub fn arguments(
        &self,
        param: usize,
    ) -> CallResult<&Arguments> {
        match self.param(param)? {
            BoundArg::Arguments(args) => Ok(args),
            other => Err(Self::mismatch(param, "Arguments", other)),
        }
    }

    bound_accessors! {
        string, opt_string, String, Arc<str>;
        number, opt_number, Number, f64;
        int, opt_int, Int, i64;
        boolean, opt_boolean, Bool, bool;
        table, opt_table, Table, Arc<Table>;
        value, opt_value, Any, Value;
        ordinal, opt_ordinal, Enum, usize;
    }

    fn param(
        &self,
        param: usize,
    ) -> CallResult<&BoundArg> {
        self.params
            .get(param)
            .ok_or_else(|| ErrorKind::HostFault(format!("no parameter {}", param)).into())
    }

    fn mismatch(
        param: usize,
        wanted: &str,
        got: &BoundArg,
    ) -> MethodError {
        ErrorKind::HostFault(format!(
            "parameter {} is bound as {}, not {}",
            param,
            got.kind(),
            wanted
        ))
        .into()
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// One script-callable method
pub struct MethodDecl {
    id: MethodId,
    /// Exported names; the first is the primary one
    pub names: SmallVec<[&'static str; 2]>,
    /// Carries the discovery marker
    pub flagged: bool,
    pub kind: MethodKind,
    pub visibility: Visibility,
    pub params: Vec<ParamType>,
    pub returns: ReturnType,
    pub throws: Throws,
    /// Must run on the main thread
    pub main_thread: bool,
    body: Arc<MethodBody>,
}

impl fmt::Debug for MethodDecl {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("id", &self.id)
            .field("names", &self.names)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("main_thread", &self.main_thread)
            .finish_non_exhaustive()
    }
}

impl MethodDecl {
    fn with_kind<F, R>(
        kind: MethodKind,
        name: &'static str,
        body: F,
    ) -> Self
    where
        F: Fn(&Invocation) -> CallResult<R> + Send + Sync + 'static,
        R: IntoReturn,
    {
        Self {
            id: MethodId::next(),
            names: smallvec![name],
            flagged: true,
            kind,
            visibility: Visibility::Public,
            params: Vec::new(),
            returns: R::KIND,
            throws: Throws::MethodError,
            main_thread: false,
            body: Arc::new(move |call: &Invocation| body(call).map(IntoReturn::into_result)),
        }
    }

    /// A method called on an instance of its class
    pub fn instance<F, R>(
        name: &'static str,
        body: F,
    ) -> Self
    where
        F: Fn(&Invocation) -> CallResult<R> + Send + Sync + 'static,
        R: IntoReturn,
    {
        Self::with_kind(MethodKind::Instance, name, body)
    }

    /// A static method. Only valid inside a [`GenericSource`], where the
    /// first parameter must be [`ParamType::Receiver`].
    pub fn static_fn<F, R>(
        name: &'static str,
        body: F,
    ) -> Self
    where
        F: Fn(&Invocation) -> CallResult<R> + Send + Sync + 'static,
        R: IntoReturn,
    {
        Self::with_kind(MethodKind::Static, name, body)
    }

    pub fn param(
        mut self,
        ty: ParamType,
    ) -> Self {
        self.params.push(ty);
        self
    }

    /// Export under an additional name
    pub fn alias(
        mut self,
        name: &'static str,
    ) -> Self {
        self.names.push(name);
        self
    }

    pub fn main_thread(mut self) -> Self {
        self.main_thread = true;
        self
    }

    pub fn throws(
        mut self,
        throws: Throws,
    ) -> Self {
        self.throws = throws;
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Drop the discovery marker
    pub fn unflagged(mut self) -> Self {
        self.flagged = false;
        self
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    /// Primary name
    pub fn name(&self) -> &'static str {
        self.names[0]
    }

    pub(crate) fn body(&self) -> Arc<MethodBody> {
        self.body.clone()
    }
}

/// The declared surface of a host type
pub struct ClassDecl {
    type_id: TypeId,
    pub name: &'static str,
    pub public: bool,
    /// Tags matched against generic source targets
    pub tags: SmallVec<[&'static str; 2]>,
    pub methods: Vec<Arc<MethodDecl>>,
}

impl fmt::Debug for ClassDecl {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ClassDecl")
            .field("name", &self.name)
            .field("public", &self.public)
            .field("tags", &self.tags)
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl ClassDecl {
    pub fn new<T: Any>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name,
            public: true,
            tags: SmallVec::new(),
            methods: Vec::new(),
        }
    }

    pub fn method(
        mut self,
        method: MethodDecl,
    ) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    /// Share an already declared method
    pub fn shared_method(
        mut self,
        method: Arc<MethodDecl>,
    ) -> Self {
        self.methods.push(method);
        self
    }

    /// Mark as satisfying a generic source target
    pub fn tag(
        mut self,
        tag: &'static str,
    ) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn satisfies(
        &self,
        tag: &str,
    ) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }
}

// ============================================================================
// Generic sources
// ============================================================================

/// A set of generic extension methods
#[derive(Debug)]
pub struct GenericSource {
    pub name: &'static str,
    /// Tag a class must carry to receive these methods
    pub target: &'static str,
    pub methods: Vec<Arc<MethodDecl>>,
}

impl GenericSource {
    pub fn new(
        name: &'static str,
        target: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            methods: Vec::new(),
        }
    }

    pub fn method(
        mut self,
        method: MethodDecl,
    ) -> Self {
        self.methods.push(Arc::new(method));
        self
    }
}

static GENERIC_SOURCES: Lazy<RwLock<Vec<Arc<GenericSource>>>> = Lazy::new(|| RwLock::new(Vec::new()));

static GENERIC_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Register a generic source. Cached class method lists are rebuilt on
/// their next lookup.
pub fn register_generic_source(source: GenericSource) {
    GENERIC_SOURCES.write().push(Arc::new(source));
    GENERIC_GENERATION.fetch_add(1, Ordering::SeqCst);
}

/// Generic methods applicable to `class`, with their source
pub fn generic_methods_for(class: &ClassDecl) -> Vec<(Arc<GenericSource>, Arc<MethodDecl>)> {
    GENERIC_SOURCES
        .read()
        .iter()
        .filter(|source| class.satisfies(source.target))
        .flat_map(|source| {
            source
                .methods
                .iter()
                .map(move |method| (source.clone(), method.clone()))
        })
        .collect()
}

/// Bumped on every generic source registration
pub fn generic_generation() -> u64 {
    GENERIC_GENERATION.load(Ordering::SeqCst)
}
