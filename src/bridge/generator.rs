//! Method generator
//!
//! Turns declared methods into [`Trampoline`]s: closures that marshal script
//! arguments into the declared parameter types and call the method body.
//! Every trampoline is built once per method identity and cached, failures
//! included. The ordered method list of a class is cached as well.
//!
//! # Architecture
//!
//! ```text
//! ClassDecl ──► get_methods() ──► [NamedMethod { name, trampoline, simple }]
//!                    │
//!                    ▼
//!        method_cache: MethodId → Option<Trampoline>
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, error, warn};

use crate::apis::context::LuaContext;
use crate::bridge::decl::{
    self, BoundArg, ClassDecl, ContextType, ContextValue, Instance, Invocation, MethodBody,
    MethodDecl, MethodId, MethodKind, ParamType, ReturnType, Throws, Visibility,
};
use crate::bridge::main_thread;
use crate::runtime::arguments::{Arguments, EnumDecl};
use crate::runtime::error::{CallResult, ErrorKind};
use crate::runtime::method_result::MethodResult;
use crate::runtime::value::Value;

type Call = dyn Fn(&Instance, &[ContextValue], Arguments) -> CallResult<MethodResult> + Send + Sync;

struct TrampolineInner {
    method: MethodId,
    name: &'static str,
    class: &'static str,
    call: Box<Call>,
}

/// A cached adapter invoking one host method
///
/// Cloning shares the adapter; [`Trampoline::ptr_eq`] tells whether two
/// handles are the same cached instance.
#[derive(Clone)]
pub struct Trampoline {
    inner: Arc<TrampolineInner>,
}

impl fmt::Debug for Trampoline {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Trampoline({}.{})", self.inner.class, self.inner.name)
    }
}

impl Trampoline {
    pub(crate) fn new<F>(
        method: MethodId,
        name: &'static str,
        class: &'static str,
        call: F,
    ) -> Self
    where
        F: Fn(&Instance, &[ContextValue], Arguments) -> CallResult<MethodResult> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(TrampolineInner {
                method,
                name,
                class,
                call: Box::new(call),
            }),
        }
    }

    /// Invoke on `instance` with the generator's context values.
    pub fn apply(
        &self,
        instance: &Instance,
        contexts: &[ContextValue],
        args: Arguments,
    ) -> CallResult<MethodResult> {
        (self.inner.call)(instance, contexts, args)
    }

    pub fn method(&self) -> MethodId {
        self.inner.method
    }

    /// Primary method name
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Name of the declaring class or generic source
    pub fn class(&self) -> &'static str {
        self.inner.class
    }

    pub fn ptr_eq(
        &self,
        other: &Trampoline,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// An exported method name
#[derive(Debug, Clone)]
pub struct NamedMethod {
    pub name: &'static str,
    pub method: Trampoline,
    /// Finishes without yielding; may be called without a coroutine
    pub simple: bool,
}

/// How one parameter is produced from a call
#[derive(Debug, Clone)]
enum Binder {
    Receiver,
    Context(usize),
    /// Arguments from this index onwards
    Rest(usize),
    Strict(usize, Scalar),
    Enum(usize, &'static EnumDecl),
    Optional(usize, Scalar),
    OptionalEnum(usize, &'static EnumDecl),
}

#[derive(Debug, Clone, Copy)]
enum Scalar {
    String,
    Number,
    Int,
    Bool,
    Table,
    Any,
}

impl Scalar {
    fn of(ty: &ParamType) -> Option<Scalar> {
        match ty {
            ParamType::String => Some(Scalar::String),
            ParamType::Number => Some(Scalar::Number),
            ParamType::Int => Some(Scalar::Int),
            ParamType::Bool => Some(Scalar::Bool),
            ParamType::Table => Some(Scalar::Table),
            ParamType::Any => Some(Scalar::Any),
            _ => None,
        }
    }

    fn strict(
        self,
        args: &Arguments,
        index: usize,
    ) -> CallResult<BoundArg> {
        Ok(match self {
            Scalar::String => BoundArg::String(args.get_string(index)?),
            Scalar::Number => BoundArg::Number(args.get_number(index)?),
            Scalar::Int => BoundArg::Int(args.get_int(index)?),
            Scalar::Bool => BoundArg::Bool(args.get_bool(index)?),
            Scalar::Table => BoundArg::Table(args.get_table(index)?),
            Scalar::Any => BoundArg::Any(args.get(index).clone()),
        })
    }

    fn lenient(
        self,
        value: &Value,
    ) -> BoundArg {
        let bound = match (self, value) {
            (_, Value::Nil) => None,
            (Scalar::String, Value::String(s)) => Some(BoundArg::String(s.clone())),
            (Scalar::Number, v) => v.to_float().map(BoundArg::Number),
            (Scalar::Int, v) => v.to_int().map(BoundArg::Int),
            (Scalar::Bool, Value::Bool(b)) => Some(BoundArg::Bool(*b)),
            (Scalar::Table, Value::Table(t)) => Some(BoundArg::Table(t.clone())),
            (Scalar::Any, v) => Some(BoundArg::Any(v.clone())),
            _ => None,
        };
        bound.unwrap_or(BoundArg::Absent)
    }
}

impl Binder {
    fn bind(
        &self,
        instance: &Instance,
        contexts: &[ContextValue],
        args: &Arguments,
    ) -> CallResult<BoundArg> {
        match self {
            Binder::Receiver => Ok(BoundArg::Receiver(instance.clone())),
            Binder::Context(slot) => contexts
                .get(*slot)
                .cloned()
                .map(BoundArg::Context)
                .ok_or_else(|| ErrorKind::HostFault(format!("missing context value {}", slot)).into()),
            Binder::Rest(from) => Ok(BoundArg::Arguments(args.drop(*from as i64)?)),
            Binder::Strict(index, scalar) => scalar.strict(args, *index),
            Binder::Enum(index, decl) => Ok(BoundArg::Enum(args.get_enum(*index, decl)?)),
            Binder::Optional(index, scalar) => Ok(scalar.lenient(args.get(*index))),
            Binder::OptionalEnum(index, decl) => Ok(args
                .get(*index)
                .as_str()
                .and_then(|name| decl.ordinal_of(name))
                .map(BoundArg::Enum)
                .unwrap_or(BoundArg::Absent)),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedClass {
    generation: u64,
    methods: Arc<[NamedMethod]>,
}

/// Builds and caches trampolines for one set of context types
pub struct Generator {
    name: &'static str,
    contexts: SmallVec<[ContextType; 2]>,
    method_cache: RwLock<HashMap<MethodId, Option<Trampoline>>>,
    class_cache: RwLock<HashMap<TypeId, CachedClass>>,
}

impl fmt::Debug for Generator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.name)
            .field("contexts", &self.contexts)
            .field("cached_methods", &self.method_cache.read().len())
            .field("cached_classes", &self.class_cache.read().len())
            .finish()
    }
}

impl Generator {
    /// Create a generator whose methods may bind `contexts` positionally.
    pub fn new(
        name: &'static str,
        contexts: impl IntoIterator<Item = ContextType>,
    ) -> Self {
        Self {
            name,
            contexts: contexts.into_iter().collect(),
            method_cache: RwLock::new(HashMap::new()),
            class_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contexts(&self) -> &[ContextType] {
        &self.contexts
    }

    /// Every method `class` exposes, in declaration order, followed by the
    /// generic methods it receives. Methods that fail to build are left out.
    pub fn get_methods(
        &self,
        class: &'static ClassDecl,
    ) -> Arc<[NamedMethod]> {
        let generation = decl::generic_generation();
        if let Some(cached) = self.class_cache.read().get(&class.type_id()) {
            if cached.generation == generation {
                return cached.methods.clone();
            }
        }

        let methods: Arc<[NamedMethod]> = self.build_class(class).into();
        self.class_cache.write().insert(
            class.type_id(),
            CachedClass {
                generation,
                methods: methods.clone(),
            },
        );
        methods
    }

    fn build_class(
        &self,
        class: &'static ClassDecl,
    ) -> Vec<NamedMethod> {
        let mut out = Vec::new();
        for method in &class.methods {
            if !method.flagged {
                continue;
            }
            if method.kind == MethodKind::Static {
                warn!(
                    "Lua Method {}.{} should be an instance method",
                    class.name,
                    method.name()
                );
                continue;
            }
            if !class.public {
                error!(
                    "Lua Method {}.{} should be a public method on a public class",
                    class.name,
                    method.name()
                );
                continue;
            }
            self.push_named(&mut out, class.name, method);
        }

        for (source, method) in decl::generic_methods_for(class) {
            if !method.flagged {
                continue;
            }
            if method.kind != MethodKind::Static {
                error!(
                    "Generic Lua Method {}.{} should be a static method",
                    source.name,
                    method.name()
                );
                continue;
            }
            if method.params.first() != Some(&ParamType::Receiver) {
                error!(
                    "Generic Lua Method {}.{} should take the receiver as its first parameter",
                    source.name,
                    method.name()
                );
                continue;
            }
            self.push_named(&mut out, source.name, &method);
        }
        out
    }

    fn push_named(
        &self,
        out: &mut Vec<NamedMethod>,
        owner: &'static str,
        method: &Arc<MethodDecl>,
    ) {
        let Some(trampoline) = self.trampoline(owner, method) else {
            return;
        };
        let simple = method.returns != ReturnType::MethodResult && !method.main_thread;
        for name in method.names.iter().copied() {
            out.push(NamedMethod {
                name,
                method: trampoline.clone(),
                simple,
            });
        }
    }

    /// The cached trampoline for `method` declared by `owner`, building it
    /// on first use. Returns `None` if the method cannot be exposed; that
    /// outcome is cached too.
    pub fn trampoline(
        &self,
        owner: &'static str,
        method: &Arc<MethodDecl>,
    ) -> Option<Trampoline> {
        if let Some(cached) = self.method_cache.read().get(&method.id()) {
            return cached.clone();
        }

        let mut cache = self.method_cache.write();
        cache
            .entry(method.id())
            .or_insert_with(|| self.build(owner, method))
            .clone()
    }

    fn build(
        &self,
        owner: &'static str,
        method: &MethodDecl,
    ) -> Option<Trampoline> {
        let name = method.name();

        if method.visibility != Visibility::Public {
            error!("Lua Method {}.{} should be a public method", owner, name);
            return None;
        }

        if let Throws::Other(other) = method.throws {
            error!(
                "Lua Method {}.{} cannot throw {}, only MethodError",
                owner, name, other
            );
            return None;
        }

        debug!("Generating method wrapper for {}.{}", owner, name);

        let binders = match self.binders(method) {
            Ok(binders) => binders,
            Err(ty) => {
                error!(
                    "Cannot generate lua method {}.{}: unknown parameter type {}",
                    owner, name, ty
                );
                return None;
            }
        };

        let direct = direct_call(method.id(), name, owner, binders, method.body());
        if !method.main_thread {
            return Some(direct);
        }

        let Some(slot) = self.context_slot(TypeId::of::<LuaContext>()) else {
            error!(
                "Cannot generate lua method {}.{}: main thread methods need a lua context",
                owner, name
            );
            return None;
        };
        Some(main_thread::wrap(direct, slot))
    }

    fn context_slot(
        &self,
        id: TypeId,
    ) -> Option<usize> {
        self.contexts.iter().position(|ctx| ctx.id() == id)
    }

    fn binders(
        &self,
        method: &MethodDecl,
    ) -> Result<Vec<Binder>, ParamType> {
        let mut index = 0;
        let mut binders = Vec::with_capacity(method.params.len());
        for param in &method.params {
            let binder = match param {
                ParamType::Receiver => Binder::Receiver,
                ParamType::Context(ty) => {
                    Binder::Context(self.context_slot(ty.id()).ok_or_else(|| param.clone())?)
                }
                ParamType::Arguments => Binder::Rest(index),
                ParamType::Enum(decl) => {
                    index += 1;
                    Binder::Enum(index - 1, *decl)
                }
                ParamType::Optional(inner) => {
                    index += 1;
                    match inner.as_ref() {
                        ParamType::Enum(decl) => Binder::OptionalEnum(index - 1, *decl),
                        other => Binder::Optional(
                            index - 1,
                            Scalar::of(other).ok_or_else(|| param.clone())?,
                        ),
                    }
                }
                other => {
                    let scalar = Scalar::of(other).ok_or_else(|| param.clone())?;
                    index += 1;
                    Binder::Strict(index - 1, scalar)
                }
            };
            binders.push(binder);
        }
        Ok(binders)
    }
}

fn direct_call(
    method: MethodId,
    name: &'static str,
    class: &'static str,
    binders: Vec<Binder>,
    body: Arc<MethodBody>,
) -> Trampoline {
    Trampoline::new(method, name, class, move |instance, contexts, args| {
        let params = binders
            .iter()
            .map(|binder| binder.bind(instance, contexts, &args))
            .collect::<CallResult<SmallVec<[BoundArg; 4]>>>()?;
        body(&Invocation::new(instance.clone(), params))
    })
}
