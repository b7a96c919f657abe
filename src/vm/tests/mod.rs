//! VM 模块测试
//!
//! 用一个最小的 `clock` API 驱动脚本线程：直接返回、等待事件、主线程任务和错误。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::bridge::decl::{ClassDecl, Declared, MethodDecl, ParamType};
use crate::runtime::error::{CallResult, MethodError, ScriptError};
use crate::runtime::method_result::MethodResult;
use crate::runtime::value::Value;
use crate::util::config::BridgeConfig;
use crate::vm::{ScriptApi, ThreadStatus, VMError, VMStatus, VM};

#[derive(Default)]
struct Clock {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

static CLOCK: Lazy<ClassDecl> = Lazy::new(|| {
    ClassDecl::new::<Clock>("Clock")
        .method(MethodDecl::instance("time", |_call| Ok(42i64)))
        .method(MethodDecl::instance("sleep", |_call| {
            Ok(MethodResult::pull_event(Some("timer"), |event: Vec<Value>| {
                Ok(MethodResult::values(event))
            }))
        }))
        .method(MethodDecl::instance("fail", |_call| {
            Err::<(), _>(MethodError::with_level("nope", 1))
        }))
        .method(
            MethodDecl::instance("double", |call| Ok(call.number(0)? * 2.0))
                .param(ParamType::Number)
                .main_thread(),
        )
        .method(MethodDecl::instance("crash", |_call| -> CallResult<()> {
            panic!("gears jammed")
        }))
});

impl Declared for Clock {
    fn declaration(&self) -> &'static ClassDecl {
        &CLOCK
    }
}

impl ScriptApi for Clock {
    fn names(&self) -> &[&'static str] {
        &["clock"]
    }

    fn startup(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn machine() -> (VM, Arc<Clock>) {
    let mut vm = VM::new(BridgeConfig::default());
    let clock = Arc::new(Clock::default());
    vm.add_api(clock.clone());
    vm.startup();
    (vm, clock)
}

#[cfg(test)]
mod vm_lifecycle_tests {
    use super::*;

    #[test]
    fn test_spawn_requires_running() {
        let mut vm = VM::default();
        vm.add_api(Arc::new(Clock::default()));
        assert_eq!(vm.status(), VMStatus::Stopped);
        assert_eq!(vm.spawn("clock", "time", vec![]), Err(VMError::NotRunning));
    }

    #[test]
    fn test_startup_and_shutdown_are_idempotent() {
        let (mut vm, clock) = machine();
        vm.startup();
        assert_eq!(clock.starts.load(Ordering::SeqCst), 1);
        vm.shutdown();
        vm.shutdown();
        assert_eq!(clock.stops.load(Ordering::SeqCst), 1);
        assert_eq!(vm.status(), VMStatus::Stopped);
    }

    #[test]
    fn test_api_added_while_running_is_started() {
        let (mut vm, _) = machine();
        let late = Arc::new(Clock::default());
        vm.add_api(late.clone());
        assert_eq!(late.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_drops_threads() {
        let (mut vm, _) = machine();
        vm.spawn("clock", "sleep", vec![]).unwrap();
        assert_eq!(vm.threads().count(), 1);
        vm.shutdown();
        assert_eq!(vm.threads().count(), 0);
    }
}

#[cfg(test)]
mod vm_globals_tests {
    use super::*;

    #[test]
    fn test_methods_in_declaration_order() {
        let (vm, _) = machine();
        assert_eq!(vm.globals().collect::<Vec<_>>(), vec!["clock"]);
        assert_eq!(
            vm.methods("clock").unwrap(),
            vec!["time", "sleep", "fail", "double", "crash"]
        );
    }

    #[test]
    fn test_unknown_names() {
        let (mut vm, _) = machine();
        assert_eq!(
            vm.spawn("fs", "list", vec![]),
            Err(VMError::UnknownGlobal("fs".to_string()))
        );
        let err = vm.spawn("clock", "alarm", vec![]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "attempt to call field 'alarm' of 'clock' (a nil value)"
        );
    }
}

#[cfg(test)]
mod vm_thread_tests {
    use super::*;

    #[test]
    fn test_simple_call_finishes_immediately() {
        let (mut vm, _) = machine();
        let id = vm.spawn("clock", "time", vec![]).unwrap();
        assert_eq!(vm.thread(id).unwrap().status(), ThreadStatus::Finished);
        assert_eq!(vm.take_result(id).unwrap(), Some(Ok(vec![Value::Int(42)])));
        assert!(matches!(vm.thread(id), Err(VMError::UnknownThread(_))));
    }

    #[test]
    fn test_parked_thread_waits_for_its_event() {
        let (mut vm, _) = machine();
        let id = vm.spawn("clock", "sleep", vec![]).unwrap();
        assert_eq!(
            vm.thread(id).unwrap().status(),
            ThreadStatus::Parked(Some("timer".to_string()))
        );

        vm.queue_event("key", vec![Value::Int(30)]);
        assert_eq!(vm.pump(), 0);
        assert_eq!(vm.take_result(id).unwrap(), None);

        vm.queue_event("timer", vec![Value::Int(1)]);
        assert_eq!(vm.pump(), 1);
        assert_eq!(vm.thread(id).unwrap().resumes(), 1);
        assert_eq!(
            vm.take_result(id).unwrap(),
            Some(Ok(vec![Value::from("timer"), Value::Int(1)]))
        );
    }

    #[test]
    fn test_terminate_aborts_wait() {
        let (mut vm, _) = machine();
        let id = vm.spawn("clock", "sleep", vec![]).unwrap();
        vm.queue_event("terminate", vec![]);
        vm.pump();
        assert_eq!(
            vm.take_result(id).unwrap(),
            Some(Err(ScriptError::new("Terminated", 0)))
        );
    }

    #[test]
    fn test_error_keeps_level() {
        let (mut vm, _) = machine();
        let result = vm.call("clock", "fail", vec![], 0).unwrap();
        assert_eq!(result, Some(Err(ScriptError::new("nope", 1))));
    }

    #[test]
    fn test_panic_becomes_host_fault() {
        let (mut vm, _) = machine();
        let result = vm.call("clock", "crash", vec![], 0).unwrap();
        assert_eq!(
            result,
            Some(Err(ScriptError::new("Host exception thrown: gears jammed", 0)))
        );
    }

    #[test]
    fn test_main_thread_method_completes_after_tick() {
        let (mut vm, _) = machine();
        let id = vm.spawn("clock", "double", vec![Value::Int(3)]).unwrap();
        assert_eq!(
            vm.thread(id).unwrap().status(),
            ThreadStatus::Parked(Some("task_complete".to_string()))
        );
        assert_eq!(vm.main_thread().pending(), 1);

        assert_eq!(vm.tick(), 1);
        assert_eq!(vm.take_result(id).unwrap(), Some(Ok(vec![Value::Float(6.0)])));
    }

    #[test]
    fn test_main_thread_argument_error_reported() {
        let (mut vm, _) = machine();
        let result = vm.call("clock", "double", vec![Value::from("x")], 4).unwrap();
        assert_eq!(
            result,
            Some(Err(ScriptError::new(
                "bad argument #1 (expected number, got string)",
                0
            )))
        );
    }
}
