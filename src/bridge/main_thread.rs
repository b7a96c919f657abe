//! Main thread redirection
//!
//! A method declared `main_thread` never runs on the script thread. Its
//! trampoline is wrapped so that a call queues the real invocation as a
//! main thread task and parks the caller until the `task_complete` event for
//! that task arrives.

use smallvec::SmallVec;

use crate::apis::context::LuaContext;
use crate::bridge::decl::ContextValue;
use crate::bridge::generator::Trampoline;
use crate::runtime::error::{ErrorKind, MethodError};
use crate::runtime::method_result::MethodResult;

pub(crate) const CANNOT_SUSPEND: &str = "Cannot suspend from a main thread method";

/// Redirect `direct` to the main thread. `lua_slot` is the position of the
/// [`LuaContext`] among the generator's context values.
pub(crate) fn wrap(
    direct: Trampoline,
    lua_slot: usize,
) -> Trampoline {
    Trampoline::new(
        direct.method(),
        direct.name(),
        direct.class(),
        move |instance, contexts, args| {
            let context = contexts
                .get(lua_slot)
                .and_then(|ctx| ctx.downcast_ref::<LuaContext>())
                .ok_or_else(|| MethodError::from(ErrorKind::HostFault("no lua context".to_string())))?;

            let direct = direct.clone();
            let instance = instance.clone();
            let contexts: SmallVec<[ContextValue; 2]> = contexts.iter().cloned().collect();
            context.execute_main_thread_task(move || {
                match direct.apply(&instance, &contexts, args)? {
                    MethodResult::Done(values) => Ok(values),
                    MethodResult::Pending { .. } => Err(MethodError::new(CANNOT_SUSPEND)),
                }
            })
        },
    )
}
