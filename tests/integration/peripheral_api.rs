//! Peripheral registry driven through the script machine

use std::sync::Arc;

use once_cell::sync::Lazy;
use periphery::apis::{ComputerSide, Peripheral};
use periphery::bridge::{ClassDecl, Declared, MethodDecl, ParamType};
use periphery::runtime::{MethodError, MethodResult, ScriptError, Value};
use periphery::vm::ThreadStatus;
use periphery::{boot, BridgeConfig, Computer};

/// Fails on request, optionally after waiting for an event
struct Faulty;

static FAULTY: Lazy<ClassDecl> = Lazy::new(|| {
    ClassDecl::new::<Faulty>("Faulty")
        .method(
            MethodDecl::instance("fail", |call| {
                Err::<(), _>(MethodError::with_level("fault", call.int(0)? as u32))
            })
            .param(ParamType::Int),
        )
        .method(MethodDecl::instance("failLater", |_call| {
            Ok(MethodResult::pull_event(Some("go"), |_: Vec<Value>| {
                Err(MethodError::with_level("late fault", 1))
            }))
        }))
        .method(MethodDecl::instance("failAfterTwo", |_call| {
            Ok(MethodResult::pull_event(Some("go"), |_: Vec<Value>| {
                Ok(MethodResult::pull_event(Some("go"), |_: Vec<Value>| {
                    Err(MethodError::with_level("late fault", 1))
                }))
            }))
        }))
        .method(
            MethodDecl::instance("countdown", |call| Ok(countdown(call.int(0)?)))
                .param(ParamType::Int),
        )
});

fn countdown(n: i64) -> MethodResult {
    if n == 0 {
        return MethodResult::value("liftoff");
    }
    MethodResult::pull_event(Some("tick"), move |_: Vec<Value>| Ok(countdown(n - 1)))
}

impl Declared for Faulty {
    fn declaration(&self) -> &'static ClassDecl {
        &FAULTY
    }
}

impl Peripheral for Faulty {
    fn get_type(&self) -> &str {
        "faulty"
    }
}

fn computer() -> Computer {
    let mut computer = boot(BridgeConfig::default());
    computer
        .peripherals()
        .set_peripheral(ComputerSide::Front, Some(Arc::new(Faulty)));
    computer.vm().environment().drain_events();
    computer
}

fn peripheral(
    computer: &mut Computer,
    method: &str,
    args: Vec<Value>,
) -> Result<Vec<Value>, ScriptError> {
    computer
        .vm_mut()
        .call("peripheral", method, args, 0)
        .unwrap()
        .unwrap()
}

fn call_args(
    method: &str,
    rest: Vec<Value>,
) -> Vec<Value> {
    let mut args = vec![Value::from("front"), Value::from(method)];
    args.extend(rest);
    args
}

#[test]
fn test_script_surface() {
    let mut c = computer();
    assert_eq!(
        peripheral(&mut c, "isPresent", vec![Value::from("front")]),
        Ok(vec![Value::Bool(true)])
    );
    assert_eq!(
        peripheral(&mut c, "isPresent", vec![Value::from("back")]),
        Ok(vec![Value::Bool(false)])
    );
    assert_eq!(
        peripheral(&mut c, "getType", vec![Value::from("front")]),
        Ok(vec![Value::from("faulty")])
    );
    assert_eq!(
        peripheral(&mut c, "getType", vec![Value::from("back")]),
        Ok(vec![Value::Nil])
    );
    let methods = peripheral(&mut c, "getMethods", vec![Value::from("front")]).unwrap();
    assert_eq!(
        methods,
        vec![Value::list(["fail", "failLater", "failAfterTwo", "countdown"].map(Value::from))]
    );
}

#[test]
fn test_attach_events_reach_scripts() {
    let c = boot(BridgeConfig::default());
    c.peripherals()
        .set_peripheral(ComputerSide::Right, Some(Arc::new(Faulty)));
    c.peripherals().set_peripheral(ComputerSide::Right, None);
    assert_eq!(
        c.vm().environment().drain_events(),
        vec![
            vec![Value::from("peripheral"), Value::from("right")],
            vec![Value::from("peripheral_detach"), Value::from("right")],
        ]
    );
}

#[test]
fn test_level_shifted_by_registry() {
    let mut c = computer();
    let err = peripheral(&mut c, "call", call_args("fail", vec![Value::Int(1)])).unwrap_err();
    assert_eq!(err, ScriptError::new("fault", 2));

    let err = peripheral(&mut c, "call", call_args("fail", vec![Value::Int(0)])).unwrap_err();
    assert_eq!(err.level, 0);
}

#[test]
fn test_level_shifted_on_resume() {
    let mut c = computer();
    let id = c
        .vm_mut()
        .spawn("peripheral", "call", call_args("failLater", vec![]))
        .unwrap();
    c.vm().queue_event("go", vec![]);
    c.vm_mut().pump();
    assert_eq!(
        c.vm_mut().take_result(id).unwrap(),
        Some(Err(ScriptError::new("late fault", 2)))
    );
}

#[test]
fn test_level_shifted_after_chained_resumes() {
    let mut c = computer();
    let id = c
        .vm_mut()
        .spawn("peripheral", "call", call_args("failAfterTwo", vec![]))
        .unwrap();
    c.vm().queue_event("go", vec![]);
    c.vm_mut().pump();
    assert_eq!(
        c.vm().thread(id).unwrap().status(),
        ThreadStatus::Parked(Some("go".to_string()))
    );
    c.vm().queue_event("go", vec![]);
    c.vm_mut().pump();
    assert_eq!(
        c.vm_mut().take_result(id).unwrap(),
        Some(Err(ScriptError::new("late fault", 2)))
    );
}

#[test]
fn test_only_final_values_reach_caller() {
    let mut c = computer();
    let id = c
        .vm_mut()
        .spawn("peripheral", "call", call_args("countdown", vec![Value::Int(3)]))
        .unwrap();

    for _ in 0..2 {
        c.vm().queue_event("tick", vec![]);
        c.vm_mut().pump();
        assert_eq!(
            c.vm().thread(id).unwrap().status(),
            ThreadStatus::Parked(Some("tick".to_string()))
        );
    }
    c.vm().queue_event("tick", vec![]);
    c.vm_mut().pump();

    assert_eq!(c.vm().thread(id).unwrap().resumes(), 3);
    assert_eq!(
        c.vm_mut().take_result(id).unwrap(),
        Some(Ok(vec![Value::from("liftoff")]))
    );
}

#[test]
fn test_missing_method_and_slot() {
    let mut c = computer();
    let err = peripheral(&mut c, "call", call_args("explode", vec![])).unwrap_err();
    assert_eq!(err.message, "No such method explode");

    let err = peripheral(
        &mut c,
        "call",
        vec![Value::from("bottom"), Value::from("fail"), Value::Int(1)],
    )
    .unwrap_err();
    assert_eq!(err.message, "No peripheral attached");
}

#[test]
fn test_shutdown_detaches() {
    let mut c = computer();
    let access = c.peripherals().access(ComputerSide::Front).unwrap();
    assert!(access.is_attached());
    c.vm_mut().shutdown();
    assert!(!access.is_attached());
    assert!(!c.peripherals().is_running());
}
