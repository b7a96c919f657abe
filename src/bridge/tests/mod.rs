//! Generator 测试
//!
//! 每个测试使用独立的 `Generator` 和标记类型，避免类缓存在测试之间共享。

use std::sync::Arc;

use crate::apis::context::LuaContext;
use crate::apis::{ApiEnvironment, Environment};
use crate::bridge::decl::{
    register_generic_source, ClassDecl, ContextType, ContextValue, GenericSource, Instance,
    MethodDecl, ParamType, Throws,
};
use crate::bridge::generator::Generator;
use crate::runtime::arguments::{Arguments, EnumDecl};
use crate::runtime::method_result::MethodResult;
use crate::runtime::scheduler::MainThread;
use crate::runtime::value::Value;
use crate::util::config::BridgeConfig;

fn leak(class: ClassDecl) -> &'static ClassDecl {
    Box::leak(Box::new(class))
}

fn generator() -> Generator {
    Generator::new("test", [ContextType::of::<LuaContext>()])
}

fn names(
    generator: &Generator,
    class: &'static ClassDecl,
) -> Vec<&'static str> {
    generator.get_methods(class).iter().map(|m| m.name).collect()
}

fn done(result: MethodResult) -> Vec<Value> {
    match result.into_values() {
        Some(values) => values,
        None => panic!("expected a finished result"),
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    struct Lamp;

    #[test]
    fn test_trampoline_is_built_once() {
        let generator = generator();
        let class = leak(
            ClassDecl::new::<Lamp>("Lamp").method(MethodDecl::instance("isOn", |_call| Ok(true))),
        );

        let first = generator.get_methods(class);
        let second = generator.get_methods(class);
        assert!(first[0].method.ptr_eq(&second[0].method));

        let direct = generator.trampoline("Lamp", &class.methods[0]).unwrap();
        assert!(first[0].method.ptr_eq(&direct));
    }

    #[test]
    fn test_shared_declaration_shares_trampoline() {
        struct Red;
        struct Blue;
        let generator = generator();
        let shared = Arc::new(MethodDecl::instance("getColour", |_call| Ok("any".to_string())));
        let red = leak(ClassDecl::new::<Red>("Red").shared_method(shared.clone()));
        let blue = leak(ClassDecl::new::<Blue>("Blue").shared_method(shared));

        let a = generator.get_methods(red);
        let b = generator.get_methods(blue);
        assert!(a[0].method.ptr_eq(&b[0].method));
    }

    #[test]
    fn test_failure_is_remembered() {
        let generator = generator();
        let method = Arc::new(MethodDecl::instance("hidden", |_call| Ok(())).private());
        assert!(generator.trampoline("Lamp", &method).is_none());
        assert!(generator.trampoline("Lamp", &method).is_none());
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_invalid_methods_are_left_out() {
        struct Gadget;
        let generator = generator();
        let class = leak(
            ClassDecl::new::<Gadget>("Gadget")
                .method(MethodDecl::instance("ok", |_call| Ok(())))
                .method(MethodDecl::static_fn("helper", |_call| Ok(())))
                .method(MethodDecl::instance("internal", |_call| Ok(())).unflagged())
                .method(MethodDecl::instance("secret", |_call| Ok(())).private())
                .method(MethodDecl::instance("risky", |_call| Ok(())).throws(Throws::Other("IOException")))
                .method(MethodDecl::instance("odd", |_call| Ok(())).param(ParamType::Other("ItemStack")))
                .method(MethodDecl::instance("noThrow", |_call| Ok(())).throws(Throws::Nothing)),
        );
        assert_eq!(names(&generator, class), vec!["ok", "noThrow"]);
    }

    #[test]
    fn test_private_class_exposes_nothing() {
        struct Hidden;
        let generator = generator();
        let class = leak(
            ClassDecl::new::<Hidden>("Hidden")
                .private()
                .method(MethodDecl::instance("ok", |_call| Ok(()))),
        );
        assert!(generator.get_methods(class).is_empty());
    }

    #[test]
    fn test_unknown_context_is_rejected() {
        struct Other;
        struct Widget;
        let generator = generator();
        let class = leak(
            ClassDecl::new::<Widget>("Widget")
                .method(MethodDecl::instance("f", |_call| Ok(())).param(ParamType::context::<Other>())),
        );
        assert!(generator.get_methods(class).is_empty());
    }

    #[test]
    fn test_main_thread_needs_lua_context() {
        struct Machine;
        let generator = Generator::new("bare", Vec::<ContextType>::new());
        let class = leak(
            ClassDecl::new::<Machine>("Machine")
                .method(MethodDecl::instance("work", |_call| Ok(())).main_thread()),
        );
        assert!(generator.get_methods(class).is_empty());
    }
}

#[cfg(test)]
mod binding_tests {
    use super::*;

    struct Printer;

    static SIDE: EnumDecl = EnumDecl::new("Side", &["LEFT", "RIGHT"]);

    fn printer_class() -> &'static ClassDecl {
        leak(
            ClassDecl::new::<Printer>("Printer")
                .method(
                    MethodDecl::instance("write", |call| Ok(format!("{}!", call.string(0)?)))
                        .param(ParamType::String),
                )
                .method(
                    MethodDecl::instance("scale", |call| {
                        Ok(call.opt_number(0)?.unwrap_or(1.0) * call.number(1)?)
                    })
                    .param(ParamType::optional(ParamType::Number))
                    .param(ParamType::Number),
                )
                .method(
                    MethodDecl::instance("rest", |call| Ok(call.arguments(1)?.get_all()))
                        .param(ParamType::Int)
                        .param(ParamType::Arguments),
                )
                .method(
                    MethodDecl::instance("side", |call| Ok(call.ordinal(0)?))
                        .param(ParamType::Enum(&SIDE)),
                )
                .method(
                    MethodDecl::instance("computer", |call| {
                        Ok(call.context::<LuaContext>(0)?.environment().computer_id())
                    })
                    .param(ParamType::context::<LuaContext>()),
                )
                .method(MethodDecl::instance("getPageSize", |_call| Ok(vec![Value::Int(25), Value::Int(21)])).alias("pageSize")),
        )
    }

    fn call(
        generator: &Generator,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, String> {
        let class = printer_class();
        let methods = generator.get_methods(class);
        let method = methods.iter().find(|m| m.name == name).unwrap();
        let instance: Instance = Arc::new(Printer);
        let main = MainThread::new();
        let context: ContextValue = Arc::new(LuaContext::new(Arc::new(Environment::new(
            &BridgeConfig::default(),
            main.handle(),
        ))));
        method
            .method
            .apply(&instance, &[context], Arguments::new(args))
            .map(done)
            .map_err(|err| err.message())
    }

    #[test]
    fn test_strict_binding() {
        let generator = generator();
        assert_eq!(
            call(&generator, "write", vec![Value::from("hi")]),
            Ok(vec![Value::from("hi!")])
        );
        assert_eq!(
            call(&generator, "write", vec![]),
            Err("bad argument #1 (expected string, got nil)".to_string())
        );
    }

    #[test]
    fn test_optional_binding_is_lenient() {
        let generator = generator();
        assert_eq!(
            call(&generator, "scale", vec![Value::Int(3), Value::Int(2)]),
            Ok(vec![Value::Float(6.0)])
        );
        assert_eq!(
            call(&generator, "scale", vec![Value::from("x"), Value::Int(2)]),
            Ok(vec![Value::Float(2.0)])
        );
    }

    #[test]
    fn test_rest_follows_bound_arguments() {
        let generator = generator();
        assert_eq!(
            call(&generator, "rest", vec![Value::Int(1), Value::Bool(true), Value::from("z")]),
            Ok(vec![Value::Bool(true), Value::from("z")])
        );
    }

    #[test]
    fn test_enum_binding() {
        let generator = generator();
        assert_eq!(call(&generator, "side", vec![Value::from("right")]), Ok(vec![Value::Int(1)]));
        assert_eq!(
            call(&generator, "side", vec![Value::from("up")]),
            Err("bad argument #1 (unknown option up)".to_string())
        );
    }

    #[test]
    fn test_context_binding() {
        let generator = generator();
        assert_eq!(call(&generator, "computer", vec![]), Ok(vec![Value::Int(0)]));
    }

    #[test]
    fn test_aliases_share_one_trampoline() {
        let generator = generator();
        let methods = generator.get_methods(printer_class());
        let primary = methods.iter().find(|m| m.name == "getPageSize").unwrap();
        let alias = methods.iter().find(|m| m.name == "pageSize").unwrap();
        assert!(primary.method.ptr_eq(&alias.method));
        assert!(primary.simple);
    }
}

#[cfg(test)]
mod generic_tests {
    use super::*;

    struct Barrel;
    struct Cauldron;

    #[test]
    fn test_generic_methods_follow_own_methods() {
        let generator = generator();
        let barrel = leak(
            ClassDecl::new::<Barrel>("Barrel")
                .tag("test:storage")
                .method(MethodDecl::instance("getName", |_call| Ok("barrel".to_string()))),
        );
        let cauldron = leak(ClassDecl::new::<Cauldron>("Cauldron"));

        assert_eq!(names(&generator, barrel), vec!["getName"]);

        register_generic_source(
            GenericSource::new("StorageMethods", "test:storage")
                .method(
                    MethodDecl::static_fn("capacity", |call| {
                        call.receiver::<Barrel>()?;
                        Ok(27i64)
                    })
                    .param(ParamType::Receiver),
                )
                .method(MethodDecl::instance("notStatic", |_call| Ok(())).param(ParamType::Receiver))
                .method(MethodDecl::static_fn("noReceiver", |_call| Ok(())).param(ParamType::Int)),
        );

        assert_eq!(names(&generator, barrel), vec!["getName", "capacity"]);
        assert!(generator.get_methods(cauldron).is_empty());

        let methods = generator.get_methods(barrel);
        let instance: Instance = Arc::new(Barrel);
        let values = done(methods[1].method.apply(&instance, &[], Arguments::empty()).unwrap());
        assert_eq!(values, vec![Value::Int(27)]);
        assert_eq!(methods[1].method.class(), "StorageMethods");
    }
}

#[cfg(test)]
mod main_thread_tests {
    use super::*;
    use crate::apis::TASK_COMPLETE_EVENT;

    struct Furnace;

    #[test]
    fn test_main_thread_method_runs_on_tick() {
        let generator = generator();
        let class = leak(
            ClassDecl::new::<Furnace>("Furnace").method(
                MethodDecl::instance("burnTime", |call| Ok(call.int(0)? * 200))
                    .param(ParamType::Int)
                    .main_thread(),
            ),
        );
        let methods = generator.get_methods(class);
        assert!(!methods[0].simple);

        let main = MainThread::new();
        let environment = Arc::new(Environment::new(&BridgeConfig::default(), main.handle()));
        let context: ContextValue = Arc::new(LuaContext::new(environment.clone()));
        let instance: Instance = Arc::new(Furnace);

        let result = methods[0]
            .method
            .apply(&instance, &[context], Arguments::new(vec![Value::Int(4)]))
            .unwrap();
        let MethodResult::Pending { yielded, callback, .. } = result else {
            panic!("main thread methods must yield");
        };
        assert_eq!(yielded, vec![Value::from(TASK_COMPLETE_EVENT)]);
        assert_eq!(environment.pending_events(), 0);

        assert_eq!(main.tick(), 1);
        let event = environment.pop_event().unwrap();
        assert_eq!(event[0], Value::from(TASK_COMPLETE_EVENT));
        assert_eq!(event[2], Value::Bool(true));

        let values = done(callback.resume(event).unwrap());
        assert_eq!(values, vec![Value::Int(800)]);
    }
}
